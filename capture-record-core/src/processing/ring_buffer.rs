/// Fixed-capacity circular buffer.
///
/// Backends use it to hold audio that arrived while no read request was
/// outstanding. Wrap in `Arc<parking_lot::Mutex<RingBuffer<_>>>` for
/// cross-thread access.
///
/// Overflow behavior: drops oldest elements and counts them.
#[derive(Debug)]
pub struct RingBuffer<T> {
    buffer: Vec<T>,
    write_index: usize,
    read_index: usize,
    available: usize,
    dropped: u64,
}

impl<T: Copy + Default> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![T::default(); capacity.max(1)],
            write_index: 0,
            read_index: 0,
            available: 0,
            dropped: 0,
        }
    }

    fn capacity_internal(&self) -> usize {
        self.buffer.len()
    }

    /// Append `items`, dropping the oldest buffered elements on overflow.
    ///
    /// If `items` is larger than capacity, only its last `capacity` elements are kept.
    pub fn write(&mut self, items: &[T]) {
        if items.is_empty() {
            return;
        }
        let capacity = self.capacity_internal();

        let items = if items.len() > capacity {
            self.dropped += (items.len() - capacity) as u64;
            &items[items.len() - capacity..]
        } else {
            items
        };

        let overflow = (self.available + items.len()).saturating_sub(capacity);
        if overflow > 0 {
            self.read_index = (self.read_index + overflow) % capacity;
            self.available -= overflow;
            self.dropped += overflow as u64;
        }

        // Copy in at most two contiguous runs
        let first = items.len().min(capacity - self.write_index);
        self.buffer[self.write_index..self.write_index + first].copy_from_slice(&items[..first]);
        self.buffer[..items.len() - first].copy_from_slice(&items[first..]);
        self.write_index = (self.write_index + items.len()) % capacity;
        self.available += items.len();
    }

    /// Read and remove up to `count` elements.
    pub fn read(&mut self, count: usize) -> Vec<T> {
        let to_read = count.min(self.available);
        if to_read == 0 {
            return Vec::new();
        }
        let capacity = self.capacity_internal();

        let mut result = Vec::with_capacity(to_read);
        let first = to_read.min(capacity - self.read_index);
        result.extend_from_slice(&self.buffer[self.read_index..self.read_index + first]);
        result.extend_from_slice(&self.buffer[..to_read - first]);
        self.read_index = (self.read_index + to_read) % capacity;
        self.available -= to_read;
        result
    }

    /// Read and remove everything buffered.
    pub fn drain(&mut self) -> Vec<T> {
        self.read(self.available)
    }

    pub fn count(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// Elements lost to overflow since creation or the last reset.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn reset(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
        self.dropped = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity_internal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_write_read() {
        let mut buf = RingBuffer::<u8>::new(10);
        buf.write(&[1, 2, 3]);

        assert_eq!(buf.count(), 3);
        assert_eq!(buf.read(3), vec![1, 2, 3]);
        assert!(buf.is_empty());
    }

    #[test]
    fn read_partial() {
        let mut buf = RingBuffer::<f32>::new(10);
        buf.write(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(buf.read(3), vec![1.0, 2.0, 3.0]);
        assert_eq!(buf.count(), 2);
        assert_eq!(buf.read(10), vec![4.0, 5.0]); // request more than available
        assert!(buf.is_empty());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buf = RingBuffer::<u8>::new(4);
        buf.write(&[1, 2, 3, 4]);
        buf.write(&[5, 6]); // drops 1, 2

        assert_eq!(buf.count(), 4);
        assert_eq!(buf.dropped(), 2);
        assert_eq!(buf.drain(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn write_larger_than_capacity() {
        let mut buf = RingBuffer::<u8>::new(3);
        buf.write(&[1, 2, 3, 4, 5]);

        assert_eq!(buf.dropped(), 2);
        assert_eq!(buf.read(3), vec![3, 4, 5]);
    }

    #[test]
    fn wraparound() {
        let mut buf = RingBuffer::<u8>::new(4);

        buf.write(&[1, 2, 3]);
        buf.read(2); // read_index = 2
        buf.write(&[4, 5, 6]); // wraps around

        assert_eq!(buf.count(), 4);
        assert_eq!(buf.read(4), vec![3, 4, 5, 6]);
    }

    #[test]
    fn reset_clears_buffer_and_counter() {
        let mut buf = RingBuffer::<u8>::new(2);
        buf.write(&[1, 2, 3]);
        buf.reset();

        assert!(buf.is_empty());
        assert_eq!(buf.dropped(), 0);
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn zero_capacity_is_promoted() {
        let mut buf = RingBuffer::<u8>::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.write(&[7, 8]);
        assert_eq!(buf.drain(), vec![8]);
    }
}

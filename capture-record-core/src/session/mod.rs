mod capture_record;
mod duration_timer;

pub use capture_record::CaptureRecordSession;

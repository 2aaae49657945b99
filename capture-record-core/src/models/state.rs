/// Capture/record session state machine.
///
/// State transitions:
/// ```text
/// inactive → activating → streaming ⇄ recording ⇄ paused
///                             ↓          ↓          ↓
///                          deactivating ─────────────→ inactive
/// ```
///
/// `Recording` and `Paused` are only reachable from `Streaming`. A streaming
/// error or end of stream drops any state straight back to `Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Inactive,
    Activating,
    Streaming,
    Recording,
    Paused,
    Deactivating,
}

impl SessionState {
    pub fn is_inactive(&self) -> bool {
        matches!(self, Self::Inactive)
    }

    /// Devices are open and the pull loop is running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Streaming | Self::Recording | Self::Paused)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Recording or paused: an encode sink writer is attached.
    pub fn has_recording(&self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Activating => "activating",
            Self::Streaming => "streaming",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Deactivating => "deactivating",
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Inactive
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

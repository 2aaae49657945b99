pub mod device_source;
pub mod media_muxer;
pub mod session_delegate;
pub mod sinks;

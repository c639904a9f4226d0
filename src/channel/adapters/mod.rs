//! Adapter implementations for the channel port.

mod recording;

pub use recording::{ChannelEvent, RecordingChannel};

//! Port contracts for chat channel delivery.

mod gateway;

pub use gateway::{ChannelError, ChannelGateway, ChannelResult};

//! Capability interfaces the roof controller uses to reach the hardware.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    channel_function::ChannelKind, channel_parser::ChannelStates, error::RoofResult,
    ipx800_model::Ipx800Link,
};

#[async_trait]
pub trait InputPort: Send {
    /// Read the current state of all relay outputs or all digital inputs.
    async fn read_channels(&mut self, kind: ChannelKind) -> RoofResult<ChannelStates>;
}

#[async_trait]
pub trait OutputPort: Send {
    /// Switch the relay at `index` (0 based) on or off.
    async fn write_relay(&mut self, index: usize, on: bool) -> RoofResult<()>;
}

/// Anything that can both be read and commanded.
pub trait IoUnit: InputPort + OutputPort {}

impl<T: InputPort + OutputPort> IoUnit for T {}

#[async_trait]
impl<S> InputPort for Ipx800Link<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_channels(&mut self, kind: ChannelKind) -> RoofResult<ChannelStates> {
        Ipx800Link::read_channels(self, kind).await
    }
}

#[async_trait]
impl<S> OutputPort for Ipx800Link<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_relay(&mut self, index: usize, on: bool) -> RoofResult<()> {
        Ipx800Link::write_relay(self, index, on).await
    }
}

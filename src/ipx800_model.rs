//! Provide an interface to the IPX800 I/O unit.
//!
//! The unit speaks a tiny ASCII protocol over TCP: a command without line
//! terminator, answered (for the read commands only) by a fixed size frame
//! whose first 8 bytes are the channel states.

use crate::{
    channel_function::{ChannelKind, CHANNEL_COUNT},
    channel_parser::{ChannelParser, ChannelStates},
    config,
    error::{RoofError, RoofResult},
};

use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::{sleep, timeout},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ipx800Cmd {
    GetRelays,
    GetDigitals,
    /// Switch on the relay at the given channel index (0 based).
    SetRelay(usize),
    /// Switch off the relay at the given channel index (0 based).
    ClearRelay(usize),
}

impl Ipx800Cmd {
    /// Relays are numbered from 1 on the wire, always with two digits.
    pub fn get_command(&self) -> String {
        match &self {
            Ipx800Cmd::GetRelays => "Get=R".to_string(),
            Ipx800Cmd::GetDigitals => "Get=D".to_string(),
            Ipx800Cmd::SetRelay(index) => format!("SetR={:02}", index + 1),
            Ipx800Cmd::ClearRelay(index) => format!("ClearR={:02}", index + 1),
        }
    }

    pub fn read_channels(kind: ChannelKind) -> Ipx800Cmd {
        match kind {
            ChannelKind::Relay => Ipx800Cmd::GetRelays,
            ChannelKind::Digital => Ipx800Cmd::GetDigitals,
        }
    }

    pub fn write_relay(index: usize, on: bool) -> Ipx800Cmd {
        if on {
            Ipx800Cmd::SetRelay(index)
        } else {
            Ipx800Cmd::ClearRelay(index)
        }
    }
}

#[derive(Debug)]
pub struct Ipx800Link<S> {
    stream: S,
    channel_parser: ChannelParser,
    io_timeout: Duration,
    read_retry_delay: Duration,
    quiet_timeout: Duration,
    read_attempts: usize,
    response_size: usize,
}

impl Ipx800Link<TcpStream> {
    pub async fn connect(link: &config::Link) -> RoofResult<Ipx800Link<TcpStream>> {
        let address = link.address();
        log::info!("Connecting to I/O unit at {address}.");
        let stream = timeout(link.io_timeout(), TcpStream::connect(&address))
            .await?
            .map_err(|error| {
                RoofError::communication(&format!("Cannot connect to {address}: {error}"))
            })?;
        stream.set_nodelay(true)?;
        Ipx800Link::new(stream, link)
    }
}

impl<S> Ipx800Link<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, link: &config::Link) -> RoofResult<Ipx800Link<S>> {
        Ok(Ipx800Link {
            stream,
            channel_parser: ChannelParser::new()?,
            io_timeout: link.io_timeout(),
            read_retry_delay: link.read_retry_delay(),
            quiet_timeout: link.quiet_timeout().min(link.io_timeout()),
            read_attempts: link.read_attempts.max(1),
            response_size: link.response_size.max(CHANNEL_COUNT),
        })
    }

    /// Write the whole command; a write error is not retried.
    pub async fn send_command(&mut self, ipx800_cmd: &Ipx800Cmd) -> RoofResult<()> {
        let command = ipx800_cmd.get_command();
        log::debug!("Sending {command}.");

        let write = async {
            self.stream.write_all(command.as_bytes()).await?;
            self.stream.flush().await
        };
        match timeout(self.io_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(RoofError::communication(&format!(
                "Error writing {command} to I/O unit: {error}"
            ))),
            Err(_) => Err(RoofError::communication(&format!(
                "Timed out writing {command} to I/O unit."
            ))),
        }
    }

    /// Drop whatever is already waiting on the stream, typically the late
    /// answer to a read that was given up.
    pub async fn discard_pending(&mut self) -> usize {
        let mut buffer = [0; 64];
        let mut discarded = Vec::new();
        // A zero timeout still polls the read once.
        while let Ok(Ok(n_bytes)) = timeout(Duration::ZERO, self.stream.read(&mut buffer)).await {
            if n_bytes == 0 {
                break;
            }
            discarded.extend_from_slice(&buffer[..n_bytes]);
        }
        if !discarded.is_empty() {
            log::warn!(
                "Discarded {} stale bytes from I/O unit: {:?}.",
                discarded.len(),
                String::from_utf8_lossy(&discarded)
            );
        }
        discarded.len()
    }

    /// Read one answer frame.
    ///
    /// Stops when the frame is full, at end of stream, or when the unit stays
    /// quiet for `quiet_timeout` after the channel states arrived. Failed
    /// reads are retried after a short delay, up to `read_attempts` in total.
    pub async fn read_response(&mut self) -> RoofResult<Vec<u8>> {
        let mut buffer = vec![0; self.response_size];
        let mut received = 0;
        let mut failed_attempts = 0;

        while received < self.response_size {
            let read_timeout = if received >= CHANNEL_COUNT {
                self.quiet_timeout
            } else {
                self.io_timeout
            };
            let failure = match timeout(read_timeout, self.stream.read(&mut buffer[received..]))
                .await
            {
                Ok(Ok(0)) => {
                    log::debug!("End of stream after {received} bytes.");
                    break;
                }
                Ok(Ok(n_bytes)) => {
                    received += n_bytes;
                    continue;
                }
                Ok(Err(error)) => error.to_string(),
                Err(_) if received >= CHANNEL_COUNT => break,
                Err(_) => format!("no answer after {} ms", self.io_timeout.as_millis()),
            };

            failed_attempts += 1;
            log::warn!(
                "Error reading answer from I/O unit ({failed_attempts}/{}): {failure}.",
                self.read_attempts
            );
            if failed_attempts >= self.read_attempts {
                return Err(RoofError::communication(&format!(
                    "Giving up reading I/O unit answer after {failed_attempts} attempts: {failure}"
                )));
            }
            sleep(self.read_retry_delay).await;
        }

        buffer.truncate(received);
        log::trace!("Answer length: {received}, content: {buffer:?}.");
        Ok(buffer)
    }

    /// Send `Get=R` or `Get=D` and decode the answer.
    pub async fn read_channels(&mut self, kind: ChannelKind) -> RoofResult<ChannelStates> {
        self.discard_pending().await;
        self.send_command(&Ipx800Cmd::read_channels(kind)).await?;
        let response = self.read_response().await?;
        self.channel_parser.parse_channel_states(&response)
    }

    /// Send `SetR=NN` or `ClearR=NN`; the unit does not answer those.
    pub async fn write_relay(&mut self, index: usize, on: bool) -> RoofResult<()> {
        if index >= CHANNEL_COUNT {
            return Err(RoofError::configuration(&format!(
                "Relay index {index} out of range."
            )));
        }
        self.send_command(&Ipx800Cmd::write_relay(index, on)).await
    }
}

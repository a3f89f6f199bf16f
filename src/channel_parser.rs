//! Validate and decode the channel states answered by the I/O unit.

use regex::bytes::Regex;

use crate::{
    channel_function::CHANNEL_COUNT,
    error::{RoofError, RoofResult},
};

/// Only the first 8 bytes of an answer carry channel states.
const CHANNEL_STATES: &str = r"^[01]{8}";

pub type ChannelStates = [bool; CHANNEL_COUNT];

#[derive(Debug, Clone)]
pub struct ChannelParser {
    channel_states: Regex,
}

impl ChannelParser {
    pub fn new() -> Result<ChannelParser, regex::Error> {
        let channel_states = Regex::new(CHANNEL_STATES)?;
        Ok(ChannelParser { channel_states })
    }

    /// Every one of the first 8 bytes must be `'0'` or `'1'`.
    pub fn validate_response(&self, response: &[u8]) -> bool {
        self.channel_states.is_match(response)
    }

    /// Decode a validated answer: channel i is on iff byte i is `'1'`.
    pub fn parse_channel_states(&self, response: &[u8]) -> RoofResult<ChannelStates> {
        if !self.validate_response(response) {
            let shown = &response[..response.len().min(CHANNEL_COUNT)];
            return Err(RoofError::validation(&format!(
                "Wrong data in I/O unit answer: {:?}",
                String::from_utf8_lossy(shown)
            )));
        }

        let mut states = [false; CHANNEL_COUNT];
        for (state, byte) in states.iter_mut().zip(response) {
            *state = *byte == b'1';
        }
        Ok(states)
    }
}

/// Encode channel states the way the unit answers them, e.g. `"01000000"`.
pub fn format_channel_states(states: &ChannelStates) -> String {
    states
        .iter()
        .map(|state| if *state { '1' } else { '0' })
        .collect()
}

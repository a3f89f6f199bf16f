//! Recognise I/O unit commands in the raw text received by the mock unit.

use regex::{Regex, RegexSet};

use crate::{channel_function::CHANNEL_COUNT, ipx800_model::Ipx800Cmd};

const GET_RELAYS_REGEX: &str = r"^Get=R$";
const GET_DIGITALS_REGEX: &str = r"^Get=D$";
const SET_RELAY_REGEX: &str = r"^SetR=(?P<relay>\d{2})$";
const CLEAR_RELAY_REGEX: &str = r"^ClearR=(?P<relay>\d{2})$";

/// Any command; commands are not terminated so several may arrive at once.
const ANY_COMMAND_REGEX: &str = r"Get=R|Get=D|SetR=\d{2}|ClearR=\d{2}";

pub struct Ipx800CmdRegex {
    regex_set: RegexSet,
    regex: Vec<Regex>,
    any_command: Regex,
}

impl Ipx800CmdRegex {
    pub fn new() -> Result<Ipx800CmdRegex, regex::Error> {
        let regex_set = RegexSet::new([
            GET_RELAYS_REGEX,
            GET_DIGITALS_REGEX,
            SET_RELAY_REGEX,
            CLEAR_RELAY_REGEX,
        ])?;

        let regex = regex_set
            .patterns()
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<Regex>, regex::Error>>()?;

        let any_command = Regex::new(ANY_COMMAND_REGEX)?;

        Ok(Ipx800CmdRegex {
            regex_set,
            regex,
            any_command,
        })
    }

    fn get_match_index(&self, text: &str) -> Option<usize> {
        self.regex_set.matches(text).into_iter().next()
    }

    fn relay_index(&self, match_index: usize, text: &str) -> Option<usize> {
        let relay: usize = self.regex[match_index]
            .captures(text)?
            .name("relay")?
            .as_str()
            .parse()
            .ok()?;
        (1..=CHANNEL_COUNT).contains(&relay).then(|| relay - 1)
    }

    /// Decode one complete command; `None` for anything unknown.
    pub fn into_ipx800_cmd(&self, text: &str) -> Option<Ipx800Cmd> {
        match self.get_match_index(text)? {
            0 => Some(Ipx800Cmd::GetRelays),
            1 => Some(Ipx800Cmd::GetDigitals),
            2 => self.relay_index(2, text).map(Ipx800Cmd::SetRelay),
            3 => self.relay_index(3, text).map(Ipx800Cmd::ClearRelay),
            _ => None,
        }
    }

    /// Extract every command found in `text`.
    ///
    /// Returns the commands (`None` for a well formed command naming an
    /// unknown relay) and the number of bytes consumed. Bytes after the last
    /// command are kept by the caller since they may be the start of the
    /// next one.
    pub fn split_commands(&self, text: &str) -> (Vec<Option<Ipx800Cmd>>, usize) {
        let mut consumed = 0;
        let commands = self
            .any_command
            .find_iter(text)
            .map(|found| {
                consumed = found.end();
                self.into_ipx800_cmd(found.as_str())
            })
            .collect();
        (commands, consumed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_into_ipx800_cmd_get_relays() {
        let ipx800_cmd_regex = Ipx800CmdRegex::new().unwrap();

        let ipx800_cmd = ipx800_cmd_regex.into_ipx800_cmd("Get=R");

        assert_eq!(ipx800_cmd, Some(Ipx800Cmd::GetRelays))
    }

    #[test]
    fn test_into_ipx800_cmd_get_digitals() {
        let ipx800_cmd_regex = Ipx800CmdRegex::new().unwrap();

        let ipx800_cmd = ipx800_cmd_regex.into_ipx800_cmd("Get=D");

        assert_eq!(ipx800_cmd, Some(Ipx800Cmd::GetDigitals))
    }

    #[test]
    fn test_into_ipx800_cmd_set_relay() {
        let ipx800_cmd_regex = Ipx800CmdRegex::new().unwrap();

        let ipx800_cmd = ipx800_cmd_regex.into_ipx800_cmd("SetR=03");

        assert_eq!(ipx800_cmd, Some(Ipx800Cmd::SetRelay(2)))
    }

    #[test]
    fn test_into_ipx800_cmd_clear_relay() {
        let ipx800_cmd_regex = Ipx800CmdRegex::new().unwrap();

        let ipx800_cmd = ipx800_cmd_regex.into_ipx800_cmd("ClearR=08");

        assert_eq!(ipx800_cmd, Some(Ipx800Cmd::ClearRelay(7)))
    }

    #[test]
    fn test_into_ipx800_cmd_relay_out_of_range() {
        let ipx800_cmd_regex = Ipx800CmdRegex::new().unwrap();

        assert_eq!(ipx800_cmd_regex.into_ipx800_cmd("SetR=00"), None);
        assert_eq!(ipx800_cmd_regex.into_ipx800_cmd("SetR=09"), None);
        assert_eq!(ipx800_cmd_regex.into_ipx800_cmd("Hello"), None);
    }

    #[test]
    fn test_split_concatenated_commands() {
        let ipx800_cmd_regex = Ipx800CmdRegex::new().unwrap();

        let (commands, consumed) = ipx800_cmd_regex.split_commands("SetR=02Get=RGet=DClea");

        assert_eq!(
            commands,
            vec![
                Some(Ipx800Cmd::SetRelay(1)),
                Some(Ipx800Cmd::GetRelays),
                Some(Ipx800Cmd::GetDigitals)
            ]
        );
        assert_eq!(consumed, 17);
    }
}

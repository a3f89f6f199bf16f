//! Bidirectional table between physical channels and their semantic function.

use crate::{
    channel_function::{ChannelFunction, DigitalFunction, RelayFunction, CHANNEL_COUNT},
    error::{RoofError, RoofResult},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-channel function selection, as persisted in the configuration file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSelections {
    pub relays: [RelayFunction; CHANNEL_COUNT],
    pub digitals: [DigitalFunction; CHANNEL_COUNT],
}

#[derive(Debug, Default, Clone)]
pub struct FunctionMap {
    relay_functions: [RelayFunction; CHANNEL_COUNT],
    digital_functions: [DigitalFunction; CHANNEL_COUNT],
    relay_channels: HashMap<RelayFunction, usize>,
    digital_channels: HashMap<DigitalFunction, usize>,
}

impl FunctionMap {
    pub fn new() -> FunctionMap {
        FunctionMap::default()
    }

    /// Build the map from persisted selections.
    ///
    /// A function selected on more than one channel is kept on the highest
    /// channel; the other channels are reset to unused.
    pub fn from_selections(selections: &ChannelSelections) -> FunctionMap {
        let mut function_map = FunctionMap {
            relay_functions: selections.relays,
            digital_functions: selections.digitals,
            ..Default::default()
        };
        function_map.rebuild();
        function_map
    }

    /// Re-derive both inverse lookups from the per-channel tables.
    pub fn rebuild(&mut self) {
        self.relay_channels.clear();
        self.digital_channels.clear();

        for channel in 0..CHANNEL_COUNT {
            let function = self.relay_functions[channel];
            if function == RelayFunction::Unused {
                continue;
            }
            if let Some(previous) = self.relay_channels.insert(function, channel) {
                log::warn!(
                    "Relay function {function} selected on relays {} and {}; keeping relay {}.",
                    previous + 1,
                    channel + 1,
                    channel + 1
                );
                self.relay_functions[previous] = RelayFunction::Unused;
            }
        }

        for channel in 0..CHANNEL_COUNT {
            let function = self.digital_functions[channel];
            if function == DigitalFunction::Unused {
                continue;
            }
            if let Some(previous) = self.digital_channels.insert(function, channel) {
                log::warn!(
                    "Digital function {function} selected on inputs {} and {}; keeping input {}.",
                    previous + 1,
                    channel + 1,
                    channel + 1
                );
                self.digital_functions[previous] = DigitalFunction::Unused;
            }
        }
    }

    /// Bind `function` to the channel at `index` (0 based).
    ///
    /// Returns the channel that held the function before, which is now
    /// unused.
    pub fn assign(&mut self, index: usize, function: ChannelFunction) -> RoofResult<Option<usize>> {
        if index >= CHANNEL_COUNT {
            return Err(RoofError::configuration(&format!(
                "Channel index {index} out of range; expected 0..{}.",
                CHANNEL_COUNT - 1
            )));
        }

        let displaced = match function {
            ChannelFunction::Relay(function) => {
                let old_function = self.relay_functions[index];
                if self.relay_channels.get(&old_function) == Some(&index) {
                    self.relay_channels.remove(&old_function);
                }
                let displaced = if function == RelayFunction::Unused {
                    None
                } else {
                    self.relay_channels
                        .insert(function, index)
                        .filter(|previous| *previous != index)
                };
                if let Some(previous) = displaced {
                    self.relay_functions[previous] = RelayFunction::Unused;
                }
                self.relay_functions[index] = function;
                displaced
            }
            ChannelFunction::Digital(function) => {
                let old_function = self.digital_functions[index];
                if self.digital_channels.get(&old_function) == Some(&index) {
                    self.digital_channels.remove(&old_function);
                }
                let displaced = if function == DigitalFunction::Unused {
                    None
                } else {
                    self.digital_channels
                        .insert(function, index)
                        .filter(|previous| *previous != index)
                };
                if let Some(previous) = displaced {
                    self.digital_functions[previous] = DigitalFunction::Unused;
                }
                self.digital_functions[index] = function;
                displaced
            }
        };

        Ok(displaced)
    }

    pub fn resolve_relay(&self, function: RelayFunction) -> Option<usize> {
        self.relay_channels.get(&function).copied()
    }

    pub fn resolve_digital(&self, function: DigitalFunction) -> Option<usize> {
        self.digital_channels.get(&function).copied()
    }

    pub fn relay_function_of(&self, index: usize) -> Option<RelayFunction> {
        self.relay_functions.get(index).copied()
    }

    pub fn digital_function_of(&self, index: usize) -> Option<DigitalFunction> {
        self.digital_functions.get(index).copied()
    }

    /// Current selection for every channel, ready to be persisted.
    pub fn selections(&self) -> ChannelSelections {
        ChannelSelections {
            relays: self.relay_functions,
            digitals: self.digital_functions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_and_resolve_relay() {
        let mut function_map = FunctionMap::new();

        let displaced = function_map
            .assign(3, ChannelFunction::Relay(RelayFunction::RoofControlCommand))
            .unwrap();

        assert!(displaced.is_none());
        assert_eq!(
            function_map.resolve_relay(RelayFunction::RoofControlCommand),
            Some(3)
        );
        assert_eq!(
            function_map.relay_function_of(3),
            Some(RelayFunction::RoofControlCommand)
        );
    }

    #[test]
    fn test_unassigned_resolves_to_none() {
        let function_map = FunctionMap::new();

        assert!(function_map
            .resolve_digital(DigitalFunction::RoofOpened)
            .is_none());
        assert!(function_map.resolve_relay(RelayFunction::Unused).is_none());
    }

    #[test]
    fn test_reassign_clears_previous_holder() {
        let mut function_map = FunctionMap::new();
        function_map
            .assign(0, ChannelFunction::Digital(DigitalFunction::RoofOpened))
            .unwrap();

        let displaced = function_map
            .assign(5, ChannelFunction::Digital(DigitalFunction::RoofOpened))
            .unwrap();

        assert_eq!(displaced, Some(0));
        assert_eq!(
            function_map.resolve_digital(DigitalFunction::RoofOpened),
            Some(5)
        );
        assert_eq!(
            function_map.digital_function_of(0),
            Some(DigitalFunction::Unused)
        );
    }

    #[test]
    fn test_overwrite_channel_releases_old_function() {
        let mut function_map = FunctionMap::new();
        function_map
            .assign(2, ChannelFunction::Relay(RelayFunction::RoofEnginePower))
            .unwrap();

        function_map
            .assign(2, ChannelFunction::Relay(RelayFunction::TubeVentilation))
            .unwrap();

        assert!(function_map
            .resolve_relay(RelayFunction::RoofEnginePower)
            .is_none());
        assert_eq!(
            function_map.resolve_relay(RelayFunction::TubeVentilation),
            Some(2)
        );
    }

    #[test]
    fn test_assign_same_channel_twice() {
        let mut function_map = FunctionMap::new();
        function_map
            .assign(1, ChannelFunction::Relay(RelayFunction::RoofEnginePower))
            .unwrap();

        let displaced = function_map
            .assign(1, ChannelFunction::Relay(RelayFunction::RoofEnginePower))
            .unwrap();

        assert!(displaced.is_none());
        assert_eq!(
            function_map.resolve_relay(RelayFunction::RoofEnginePower),
            Some(1)
        );
    }

    #[test]
    fn test_assign_out_of_range() {
        let mut function_map = FunctionMap::new();

        let result = function_map.assign(8, ChannelFunction::Relay(RelayFunction::TubeVentilation));

        assert!(result.is_err());
    }

    #[test]
    fn test_from_selections_last_channel_wins() {
        let mut selections = ChannelSelections::default();
        selections.digitals[1] = DigitalFunction::RoofClosed;
        selections.digitals[6] = DigitalFunction::RoofClosed;
        selections.relays[4] = RelayFunction::RoofControlCommand;

        let function_map = FunctionMap::from_selections(&selections);

        assert_eq!(
            function_map.resolve_digital(DigitalFunction::RoofClosed),
            Some(6)
        );
        assert_eq!(
            function_map.digital_function_of(1),
            Some(DigitalFunction::Unused)
        );
        assert_eq!(
            function_map.resolve_relay(RelayFunction::RoofControlCommand),
            Some(4)
        );
        assert_eq!(function_map.selections().relays[4], RelayFunction::RoofControlCommand);
    }
}

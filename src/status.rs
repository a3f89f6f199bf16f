//! Define the observatory status derived from the raw channel states.

use std::fmt;

use crate::{
    channel_function::{DigitalFunction, CHANNEL_COUNT},
    channel_parser::{format_channel_states, ChannelStates},
    function_map::FunctionMap,
};

/// Last complete snapshot read from the I/O unit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawIoState {
    pub relays: ChannelStates,
    pub digitals: ChannelStates,
}

impl RawIoState {
    fn digital(&self, function_map: &FunctionMap, function: DigitalFunction) -> Option<bool> {
        function_map
            .resolve_digital(function)
            .filter(|index| *index < CHANNEL_COUNT)
            .map(|index| self.digitals[index])
    }
}

impl fmt::Display for RawIoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "relays {} digitals {}",
            format_channel_states(&self.relays),
            format_channel_states(&self.digitals)
        )
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RoofPosition {
    Opened,
    Closed,
    #[default]
    Unknown,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MountParkState {
    RaParked,
    DecParked,
    BothParked,
    #[default]
    NoneParked,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ObservatoryStatus {
    pub roof_position: RoofPosition,
    pub mount_park_state: MountParkState,
    pub engine_powered: bool,
}

impl ObservatoryStatus {
    /// Combine the raw input bits with the channel mapping.
    ///
    /// An unmapped sensor never reads as set: the roof position becomes
    /// unknown, the axis reads as not parked and the engine as unpowered.
    pub fn derive(raw_state: &RawIoState, function_map: &FunctionMap) -> ObservatoryStatus {
        let opened = raw_state.digital(function_map, DigitalFunction::RoofOpened);
        let closed = raw_state.digital(function_map, DigitalFunction::RoofClosed);
        let roof_position = match (opened, closed) {
            (Some(true), Some(false)) => RoofPosition::Opened,
            (Some(false), Some(true)) => RoofPosition::Closed,
            _ => RoofPosition::Unknown,
        };

        let dec_parked = raw_state
            .digital(function_map, DigitalFunction::DecAxisParked)
            .unwrap_or(false);
        let ra_parked = raw_state
            .digital(function_map, DigitalFunction::RaAxisParked)
            .unwrap_or(false);
        let mount_park_state = match (dec_parked, ra_parked) {
            (true, true) => MountParkState::BothParked,
            (true, false) => MountParkState::DecParked,
            (false, true) => MountParkState::RaParked,
            (false, false) => MountParkState::NoneParked,
        };

        let engine_powered = raw_state
            .digital(function_map, DigitalFunction::RoofEnginePowered)
            .unwrap_or(false);

        ObservatoryStatus {
            roof_position,
            mount_park_state,
            engine_powered,
        }
    }
}

impl fmt::Display for ObservatoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "roof {:?}, mount {:?}, engine {}",
            self.roof_position,
            self.mount_park_state,
            if self.engine_powered { "on" } else { "off" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_function::ChannelFunction;
    use crate::channel_parser::ChannelParser;

    fn make_function_map() -> FunctionMap {
        let mut function_map = FunctionMap::new();
        for (index, function) in [
            DigitalFunction::RoofOpened,
            DigitalFunction::RoofClosed,
            DigitalFunction::DecAxisParked,
            DigitalFunction::RaAxisParked,
            DigitalFunction::RoofEnginePowered,
        ]
        .into_iter()
        .enumerate()
        {
            function_map
                .assign(index, ChannelFunction::Digital(function))
                .unwrap();
        }
        function_map
    }

    fn make_raw_state(digitals: &str) -> RawIoState {
        let channel_parser = ChannelParser::new().unwrap();
        RawIoState {
            relays: [false; CHANNEL_COUNT],
            digitals: channel_parser
                .parse_channel_states(digitals.as_bytes())
                .unwrap(),
        }
    }

    #[test]
    fn test_roof_closed() {
        let status = ObservatoryStatus::derive(&make_raw_state("01000000"), &make_function_map());

        assert_eq!(status.roof_position, RoofPosition::Closed);
        assert_eq!(status.mount_park_state, MountParkState::NoneParked);
        assert!(!status.engine_powered);
    }

    #[test]
    fn test_roof_opened() {
        let status = ObservatoryStatus::derive(&make_raw_state("10111000"), &make_function_map());

        assert_eq!(status.roof_position, RoofPosition::Opened);
        assert_eq!(status.mount_park_state, MountParkState::BothParked);
        assert!(status.engine_powered);
    }

    #[test]
    fn test_roof_unknown() {
        let function_map = make_function_map();

        let both = ObservatoryStatus::derive(&make_raw_state("11000000"), &function_map);
        let none = ObservatoryStatus::derive(&make_raw_state("00000000"), &function_map);

        assert_eq!(both.roof_position, RoofPosition::Unknown);
        assert_eq!(none.roof_position, RoofPosition::Unknown);
    }

    #[test]
    fn test_mount_single_axis() {
        let function_map = make_function_map();

        let dec = ObservatoryStatus::derive(&make_raw_state("00100000"), &function_map);
        let ra = ObservatoryStatus::derive(&make_raw_state("00010000"), &function_map);

        assert_eq!(dec.mount_park_state, MountParkState::DecParked);
        assert_eq!(ra.mount_park_state, MountParkState::RaParked);
    }

    #[test]
    fn test_unmapped_functions() {
        let status = ObservatoryStatus::derive(&make_raw_state("11111111"), &FunctionMap::new());

        assert_eq!(status, ObservatoryStatus::default());
    }

    #[test]
    fn test_unmapped_closed_sensor() {
        let mut function_map = FunctionMap::new();
        function_map
            .assign(0, ChannelFunction::Digital(DigitalFunction::RoofOpened))
            .unwrap();

        let status = ObservatoryStatus::derive(&make_raw_state("10000000"), &function_map);

        assert_eq!(status.roof_position, RoofPosition::Unknown);
    }
}

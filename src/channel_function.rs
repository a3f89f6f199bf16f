//! Define the semantic functions a physical channel of the I/O unit can fulfill.
//!
//! The unit does not know what is wired to it; the user binds every relay
//! output and digital input to one of these functions.

use crate::error::{RoofError, RoofResult};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Number of relay outputs and of digital inputs handled on the unit.
pub const CHANNEL_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Relay,
    Digital,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum RelayFunction {
    #[default]
    Unused,
    RoofEnginePower,
    TubeVentilation,
    HeatingResistor1,
    HeatingResistor2,
    RoofControlCommand,
    MountPowerSupply,
    CameraPowerSupply,
    OtherPowerSupply1,
    OtherPowerSupply2,
    OtherPowerSupply3,
}

impl RelayFunction {
    pub const ALL: [RelayFunction; 11] = [
        RelayFunction::Unused,
        RelayFunction::RoofEnginePower,
        RelayFunction::TubeVentilation,
        RelayFunction::HeatingResistor1,
        RelayFunction::HeatingResistor2,
        RelayFunction::RoofControlCommand,
        RelayFunction::MountPowerSupply,
        RelayFunction::CameraPowerSupply,
        RelayFunction::OtherPowerSupply1,
        RelayFunction::OtherPowerSupply2,
        RelayFunction::OtherPowerSupply3,
    ];

    /// Name used in the configuration file and on the console.
    pub fn name(&self) -> &'static str {
        match self {
            RelayFunction::Unused => "unused",
            RelayFunction::RoofEnginePower => "roof_engine_power",
            RelayFunction::TubeVentilation => "tube_ventilation",
            RelayFunction::HeatingResistor1 => "heating_resistor_1",
            RelayFunction::HeatingResistor2 => "heating_resistor_2",
            RelayFunction::RoofControlCommand => "roof_control_command",
            RelayFunction::MountPowerSupply => "mount_power_supply",
            RelayFunction::CameraPowerSupply => "camera_power_supply",
            RelayFunction::OtherPowerSupply1 => "other_power_supply_1",
            RelayFunction::OtherPowerSupply2 => "other_power_supply_2",
            RelayFunction::OtherPowerSupply3 => "other_power_supply_3",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelayFunction::Unused => "Unused",
            RelayFunction::RoofEnginePower => "Roof Engine Power",
            RelayFunction::TubeVentilation => "Telescope Ventilation",
            RelayFunction::HeatingResistor1 => "Heating Resistor 1",
            RelayFunction::HeatingResistor2 => "Heating Resistor 2",
            RelayFunction::RoofControlCommand => "Roof Control Command",
            RelayFunction::MountPowerSupply => "Mount Power Supply",
            RelayFunction::CameraPowerSupply => "Camera Power Supply",
            RelayFunction::OtherPowerSupply1 => "Other Power Supply 1",
            RelayFunction::OtherPowerSupply2 => "Other Power Supply 2",
            RelayFunction::OtherPowerSupply3 => "Other Power Supply 3",
        }
    }
}

impl fmt::Display for RelayFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RelayFunction {
    type Err = RoofError;

    fn from_str(text: &str) -> RoofResult<RelayFunction> {
        RelayFunction::ALL
            .into_iter()
            .find(|function| function.name() == text)
            .ok_or_else(|| RoofError::configuration(&format!("Unknown relay function: {text}.")))
    }
}

impl TryFrom<String> for RelayFunction {
    type Error = RoofError;

    fn try_from(text: String) -> RoofResult<RelayFunction> {
        text.parse()
    }
}

impl From<RelayFunction> for &'static str {
    fn from(function: RelayFunction) -> &'static str {
        function.name()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum DigitalFunction {
    #[default]
    Unused,
    DecAxisParked,
    RaAxisParked,
    RoofOpened,
    RoofClosed,
    RoofEnginePowered,
    RaspberrySupplied,
    MainPcSupplied,
    OtherDigital1,
    OtherDigital2,
}

impl DigitalFunction {
    pub const ALL: [DigitalFunction; 10] = [
        DigitalFunction::Unused,
        DigitalFunction::DecAxisParked,
        DigitalFunction::RaAxisParked,
        DigitalFunction::RoofOpened,
        DigitalFunction::RoofClosed,
        DigitalFunction::RoofEnginePowered,
        DigitalFunction::RaspberrySupplied,
        DigitalFunction::MainPcSupplied,
        DigitalFunction::OtherDigital1,
        DigitalFunction::OtherDigital2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DigitalFunction::Unused => "unused",
            DigitalFunction::DecAxisParked => "dec_axis_parked",
            DigitalFunction::RaAxisParked => "ra_axis_parked",
            DigitalFunction::RoofOpened => "roof_opened",
            DigitalFunction::RoofClosed => "roof_closed",
            DigitalFunction::RoofEnginePowered => "roof_engine_powered",
            DigitalFunction::RaspberrySupplied => "raspberry_supplied",
            DigitalFunction::MainPcSupplied => "main_pc_supplied",
            DigitalFunction::OtherDigital1 => "other_digital_1",
            DigitalFunction::OtherDigital2 => "other_digital_2",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DigitalFunction::Unused => "Unused",
            DigitalFunction::DecAxisParked => "DEC Axis Parked",
            DigitalFunction::RaAxisParked => "RA Axis Parked",
            DigitalFunction::RoofOpened => "Roof Opened",
            DigitalFunction::RoofClosed => "Roof Closed",
            DigitalFunction::RoofEnginePowered => "Roof Engine Supplied",
            DigitalFunction::RaspberrySupplied => "Raspberry Power Supplied",
            DigitalFunction::MainPcSupplied => "Main PC Supplied",
            DigitalFunction::OtherDigital1 => "Other Digital 1",
            DigitalFunction::OtherDigital2 => "Other Digital 2",
        }
    }
}

impl fmt::Display for DigitalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DigitalFunction {
    type Err = RoofError;

    fn from_str(text: &str) -> RoofResult<DigitalFunction> {
        DigitalFunction::ALL
            .into_iter()
            .find(|function| function.name() == text)
            .ok_or_else(|| {
                RoofError::configuration(&format!("Unknown digital function: {text}."))
            })
    }
}

impl TryFrom<String> for DigitalFunction {
    type Error = RoofError;

    fn try_from(text: String) -> RoofResult<DigitalFunction> {
        text.parse()
    }
}

impl From<DigitalFunction> for &'static str {
    fn from(function: DigitalFunction) -> &'static str {
        function.name()
    }
}

/// A function together with the kind of channel it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFunction {
    Relay(RelayFunction),
    Digital(DigitalFunction),
}

impl ChannelFunction {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelFunction::Relay(_) => ChannelKind::Relay,
            ChannelFunction::Digital(_) => ChannelKind::Digital,
        }
    }
}

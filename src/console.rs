//! Line oriented command host for the roof controller.
//!
//! One command per line:
//!
//! ```text
//! open | close | park | unpark | abort | status | raw
//! relay <n> <function> | digital <n> <function>
//! switch <function> on|off | weather ok|alert | save | help | quit
//! ```
//!
//! Channels are numbered from 1 as on the unit front panel.

use std::{path::PathBuf, str::FromStr, sync::Arc};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

use crate::{
    channel_function::{ChannelFunction, DigitalFunction, RelayFunction, CHANNEL_COUNT},
    config::Settings,
    error::{RoofError, RoofResult},
    ports::IoUnit,
    roof_controller::{AbortResult, MoveResult, RoofController, WeatherState},
};

const HELP: &str = "commands: open, close, park, unpark, abort, status, raw, \
relay <n> <function>, digital <n> <function>, switch <function> on|off, \
weather ok|alert, save, quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Open,
    Close,
    Park,
    Unpark,
    Abort,
    Status,
    Raw,
    /// Channel index (0 based) and its new function.
    Map(usize, ChannelFunction),
    Switch(RelayFunction, bool),
    Weather(WeatherState),
    Save,
    Help,
    Quit,
}

fn parse_channel(text: &str) -> RoofResult<usize> {
    match text.parse::<usize>() {
        Ok(number) if (1..=CHANNEL_COUNT).contains(&number) => Ok(number - 1),
        _ => Err(RoofError::validation(&format!(
            "Channel must be a number between 1 and {CHANNEL_COUNT}, got {text:?}."
        ))),
    }
}

fn parse_on_off(text: &str) -> RoofResult<bool> {
    match text {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(RoofError::validation(&format!(
            "Expected on or off, got {text:?}."
        ))),
    }
}

impl FromStr for ConsoleCommand {
    type Err = RoofError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let command = match words.as_slice() {
            ["open"] => ConsoleCommand::Open,
            ["close"] => ConsoleCommand::Close,
            ["park"] => ConsoleCommand::Park,
            ["unpark"] => ConsoleCommand::Unpark,
            ["abort" | "stop"] => ConsoleCommand::Abort,
            ["status"] => ConsoleCommand::Status,
            ["raw"] => ConsoleCommand::Raw,
            ["relay", channel, function] => ConsoleCommand::Map(
                parse_channel(channel)?,
                ChannelFunction::Relay(function.parse()?),
            ),
            ["digital", channel, function] => ConsoleCommand::Map(
                parse_channel(channel)?,
                ChannelFunction::Digital(function.parse::<DigitalFunction>()?),
            ),
            ["switch", function, state] => {
                ConsoleCommand::Switch(function.parse()?, parse_on_off(state)?)
            }
            ["weather", "ok"] => ConsoleCommand::Weather(WeatherState::Ok),
            ["weather", "alert"] => ConsoleCommand::Weather(WeatherState::Alert),
            ["save"] => ConsoleCommand::Save,
            ["help" | "?"] => ConsoleCommand::Help,
            ["quit" | "exit"] => ConsoleCommand::Quit,
            _ => {
                return Err(RoofError::validation(&format!(
                    "Unknown command {line:?}; {HELP}."
                )))
            }
        };
        Ok(command)
    }
}

pub struct Console {
    settings: Settings,
    config_path: Option<PathBuf>,
}

impl Console {
    /// `config_path` is where `save` writes the settings; `None` disables it.
    pub fn new(settings: Settings, config_path: Option<PathBuf>) -> Console {
        Console {
            settings,
            config_path,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one command against the controller and describe the outcome.
    pub async fn execute<U: IoUnit>(
        &mut self,
        roof_controller: &mut RoofController<U>,
        command: ConsoleCommand,
    ) -> RoofResult<String> {
        let reply = match command {
            ConsoleCommand::Open => describe_move(roof_controller.unpark().await),
            ConsoleCommand::Close => describe_move(roof_controller.park().await),
            ConsoleCommand::Park => describe_move(roof_controller.park().await),
            ConsoleCommand::Unpark => describe_move(roof_controller.unpark().await),
            ConsoleCommand::Abort => match roof_controller.request_abort().await {
                AbortResult::Ok(None) => "ok".to_owned(),
                AbortResult::Ok(Some(warning)) => format!("warning: {warning}"),
                AbortResult::Alert(reason) => format!("alert: {reason}"),
            },
            ConsoleCommand::Status => {
                let parked = match roof_controller.is_parked() {
                    Some(true) => "parked",
                    Some(false) => "unparked",
                    None => "park state unknown",
                };
                format!(
                    "{}; motion {:?}; weather {:?}; {parked}",
                    roof_controller.status(),
                    roof_controller.motion().phase,
                    roof_controller.weather_state()
                )
            }
            ConsoleCommand::Raw => roof_controller.raw_state().to_string(),
            ConsoleCommand::Map(index, function) => {
                match roof_controller.set_function_mapping(index, function)? {
                    Some(previous) => format!(
                        "{function:?} moved from channel {} to channel {}",
                        previous + 1,
                        index + 1
                    ),
                    None => format!("channel {} set to {function:?}", index + 1),
                }
            }
            ConsoleCommand::Switch(function, on) => {
                roof_controller.switch_relay(function, on).await?;
                format!("{function} switched {}", if on { "on" } else { "off" })
            }
            ConsoleCommand::Weather(weather) => {
                roof_controller.set_weather_state(weather);
                format!("weather {weather:?}")
            }
            ConsoleCommand::Save => {
                let Some(config_path) = &self.config_path else {
                    return Err(RoofError::configuration(
                        "No configuration file to save to.",
                    ));
                };
                self.settings.channels = roof_controller.selections();
                self.settings.save(config_path)?;
                format!("saved to {}", config_path.display())
            }
            ConsoleCommand::Help => HELP.to_owned(),
            ConsoleCommand::Quit => "bye".to_owned(),
        };
        Ok(reply)
    }

    /// Parse and run one input line. Errors are reported, not returned.
    pub async fn handle_line<U: IoUnit>(
        &mut self,
        roof_controller: &mut RoofController<U>,
        line: &str,
    ) -> (String, bool) {
        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(error) => return (format!("error: {}", error.get_error_message()), false),
        };
        log::debug!("Console command {command:?}.");
        let quit = command == ConsoleCommand::Quit;
        match self.execute(roof_controller, command).await {
            Ok(reply) => (reply, quit),
            Err(error) => {
                log::warn!("Console command {command:?} failed: {error}");
                (format!("error: {error}"), quit)
            }
        }
    }

    /// Read commands until end of input or `quit`, writing one reply line
    /// per command.
    pub async fn run<R, W, U>(
        &mut self,
        reader: R,
        mut writer: W,
        roof_controller: Arc<Mutex<RoofController<U>>>,
    ) -> RoofResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        U: IoUnit,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let (reply, quit) = {
                let mut roof_controller = roof_controller.lock().await;
                self.handle_line(&mut *roof_controller, &line).await
            };
            writer.write_all(format!("{reply}\n").as_bytes()).await?;
            writer.flush().await?;
            if quit {
                break;
            }
        }
        Ok(())
    }
}

fn describe_move(move_result: MoveResult) -> String {
    match move_result {
        MoveResult::Accepted => "ok".to_owned(),
        MoveResult::Busy(reason) => format!("busy: {reason}"),
        MoveResult::Alert(reason) => format!("alert: {reason}"),
    }
}

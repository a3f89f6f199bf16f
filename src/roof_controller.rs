//! Implement the roll-off roof controller.
//!
//! The controller is the context object handed to every call by the host: it
//! owns the link to the I/O unit, the channel mapping, the last raw snapshot
//! and the motion state machine.

use std::time::Duration;
use tokio::time::Instant;

use crate::{
    channel_function::{ChannelFunction, ChannelKind, RelayFunction},
    error::{RoofError, RoofResult},
    function_map::{ChannelSelections, FunctionMap},
    ports::IoUnit,
    status::{MountParkState, ObservatoryStatus, RawIoState, RoofPosition},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Open,
    Close,
}

impl Direction {
    fn target(&self) -> RoofPosition {
        match self {
            Direction::Open => RoofPosition::Opened,
            Direction::Close => RoofPosition::Closed,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    #[default]
    Idle,
    Opening,
    Closing,
    TimedOut,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MotionState {
    pub phase: MotionPhase,
    pub deadline: Option<Instant>,
    /// Last confirmed park state: true once the roof was seen closed after a
    /// close, false once it was seen opened after an open.
    pub parked: Option<bool>,
}

impl MotionState {
    pub fn is_moving(&self) -> bool {
        matches!(self.phase, MotionPhase::Opening | MotionPhase::Closing)
    }

    fn stop(&mut self) {
        self.phase = MotionPhase::Idle;
        self.deadline = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveResult {
    /// The control relay was switched and the roof is expected to move.
    Accepted,
    /// A motion is already in progress; nothing was sent.
    Busy(String),
    /// The request was refused by a guard or the relay command failed.
    Alert(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortResult {
    /// Nothing left moving. Carries a warning when there was nothing to stop.
    Ok(Option<String>),
    Alert(String),
}

#[derive(Debug)]
pub enum MotionEvent {
    None,
    Opened,
    Closed,
    TimedOut(RoofError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WeatherState {
    #[default]
    Ok,
    Alert,
}

pub struct RoofController<U> {
    unit: U,
    function_map: FunctionMap,
    raw_state: RawIoState,
    status: ObservatoryStatus,
    motion: MotionState,
    weather: WeatherState,
    motion_timeout: Duration,
}

impl<U: IoUnit> RoofController<U> {
    pub fn new(unit: U, function_map: FunctionMap, motion_timeout: Duration) -> RoofController<U> {
        let raw_state = RawIoState::default();
        let status = ObservatoryStatus::derive(&raw_state, &function_map);
        RoofController {
            unit,
            function_map,
            raw_state,
            status,
            motion: MotionState::default(),
            weather: WeatherState::default(),
            motion_timeout,
        }
    }

    pub fn status(&self) -> ObservatoryStatus {
        self.status
    }

    pub fn raw_state(&self) -> RawIoState {
        self.raw_state
    }

    pub fn motion(&self) -> MotionState {
        self.motion
    }

    pub fn function_map(&self) -> &FunctionMap {
        &self.function_map
    }

    pub fn selections(&self) -> ChannelSelections {
        self.function_map.selections()
    }

    pub fn unit(&self) -> &U {
        &self.unit
    }

    pub fn unit_mut(&mut self) -> &mut U {
        &mut self.unit
    }

    pub fn weather_state(&self) -> WeatherState {
        self.weather
    }

    pub fn set_weather_state(&mut self, weather: WeatherState) {
        if weather != self.weather {
            log::info!("Weather state changed to {weather:?}.");
        }
        self.weather = weather;
    }

    /// Last confirmed park state, or the live roof position when no motion
    /// was confirmed yet.
    pub fn is_parked(&self) -> Option<bool> {
        self.motion.parked.or(match self.status.roof_position {
            RoofPosition::Closed => Some(true),
            RoofPosition::Opened => Some(false),
            RoofPosition::Unknown => None,
        })
    }

    /// Bind a channel to a function and re-evaluate the status.
    ///
    /// Reconfiguring stops motion tracking.
    pub fn set_function_mapping(
        &mut self,
        index: usize,
        function: ChannelFunction,
    ) -> RoofResult<Option<usize>> {
        let displaced = self.function_map.assign(index, function)?;
        if let Some(previous) = displaced {
            log::warn!(
                "{function:?} moved from {:?} channel {} to channel {}; channel {} is now unused.",
                function.kind(),
                previous + 1,
                index + 1,
                previous + 1
            );
        } else {
            log::info!("{:?} channel {} set to {function:?}.", function.kind(), index + 1);
        }
        self.reconfigured();
        Ok(displaced)
    }

    /// Replace the whole mapping with persisted selections.
    pub fn reload_function_map(&mut self, selections: &ChannelSelections) {
        self.function_map = FunctionMap::from_selections(selections);
        self.reconfigured();
    }

    fn reconfigured(&mut self) {
        if self.motion.phase != MotionPhase::Idle {
            log::warn!(
                "Mapping changed while {:?}; motion tracking reset.",
                self.motion.phase
            );
        }
        self.motion.stop();
        self.recompute();
    }

    fn recompute(&mut self) {
        let status = ObservatoryStatus::derive(&self.raw_state, &self.function_map);
        if status != self.status {
            log::info!("Observatory status: {status}.");
        }
        self.status = status;
    }

    /// Read relays then digital inputs and recompute the status.
    ///
    /// The stored snapshot is only replaced when both reads succeed.
    pub async fn refresh(&mut self) -> RoofResult<ObservatoryStatus> {
        let relays = self.unit.read_channels(ChannelKind::Relay).await?;
        let digitals = self.unit.read_channels(ChannelKind::Digital).await?;
        self.raw_state = RawIoState { relays, digitals };
        log::debug!("Raw state: {}.", self.raw_state);
        self.recompute();
        Ok(self.status)
    }

    async fn refresh_after_command(&mut self) {
        if let Err(error) = self.refresh().await {
            log::warn!("Refresh after relay command failed: {error}");
        }
    }

    fn check_move(&self, direction: Direction) -> Result<usize, MoveResult> {
        if self.motion.is_moving() {
            return Err(MoveResult::Busy(format!(
                "Roof is already moving ({:?}).",
                self.motion.phase
            )));
        }
        if self.status.roof_position == direction.target() {
            return Err(MoveResult::Alert(format!(
                "Roof is already {:?}.",
                direction.target()
            )));
        }
        if direction == Direction::Open && self.weather == WeatherState::Alert {
            return Err(MoveResult::Alert(
                "Weather conditions are in the danger zone. Cannot open roof.".to_owned(),
            ));
        }
        if self.status.mount_park_state != MountParkState::BothParked {
            return Err(MoveResult::Alert(format!(
                "Cannot move roof while the mount is not parked ({:?}).",
                self.status.mount_park_state
            )));
        }
        if !self.status.engine_powered {
            return Err(MoveResult::Alert(
                "Roof engine is not powered.".to_owned(),
            ));
        }
        self.function_map
            .resolve_relay(RelayFunction::RoofControlCommand)
            .ok_or_else(|| {
                MoveResult::Alert(
                    RoofError::configuration("No relay is assigned to the roof control command.")
                        .to_string(),
                )
            })
    }

    /// Start opening or closing the roof.
    ///
    /// The unit has a single control relay; the direction follows from the
    /// current roof position.
    pub async fn request_move(&mut self, direction: Direction) -> MoveResult {
        log::info!("Move {direction:?} requested; {}.", self.status);
        let control_relay = match self.check_move(direction) {
            Ok(control_relay) => control_relay,
            Err(rejection) => {
                log::warn!("Move {direction:?} rejected: {rejection:?}");
                return rejection;
            }
        };

        self.motion.phase = match direction {
            Direction::Open => MotionPhase::Opening,
            Direction::Close => MotionPhase::Closing,
        };
        self.motion.deadline = Some(Instant::now() + self.motion_timeout);
        log::debug!("Switching on relay number {}.", control_relay + 1);

        let move_result = match self.unit.write_relay(control_relay, true).await {
            Ok(()) => {
                log::info!("Roof is {:?}.", self.motion.phase);
                MoveResult::Accepted
            }
            Err(error) => {
                log::error!("Failed to switch on roof control relay: {error}");
                MoveResult::Alert(format!(
                    "Failed to switch on roof control relay {}: {error}",
                    control_relay + 1
                ))
            }
        };
        self.refresh_after_command().await;
        move_result
    }

    pub async fn park(&mut self) -> MoveResult {
        self.request_move(Direction::Close).await
    }

    pub async fn unpark(&mut self) -> MoveResult {
        self.request_move(Direction::Open).await
    }

    /// Evaluate the motion against the latest status.
    pub fn on_tick(&mut self) -> MotionEvent {
        self.on_tick_at(Instant::now())
    }

    pub fn on_tick_at(&mut self, now: Instant) -> MotionEvent {
        match (self.motion.phase, self.status.roof_position) {
            (MotionPhase::Opening, RoofPosition::Opened) => {
                log::info!("Roof is open.");
                self.motion.stop();
                self.motion.parked = Some(false);
                MotionEvent::Opened
            }
            (MotionPhase::Closing, RoofPosition::Closed) => {
                log::info!("Roof is closed.");
                self.motion.stop();
                self.motion.parked = Some(true);
                MotionEvent::Closed
            }
            (MotionPhase::Opening | MotionPhase::Closing, _) => match self.motion.deadline {
                Some(deadline) if now > deadline => {
                    let error = RoofError::motion_timeout(&format!(
                        "Roof still {:?} after {} s; roof position is {:?}.",
                        self.motion.phase,
                        self.motion_timeout.as_secs(),
                        self.status.roof_position
                    ));
                    log::error!("{error}");
                    self.motion.phase = MotionPhase::TimedOut;
                    self.motion.deadline = None;
                    MotionEvent::TimedOut(error)
                }
                _ => MotionEvent::None,
            },
            _ => MotionEvent::None,
        }
    }

    /// Emergency stop: cut the roof engine power.
    pub async fn request_abort(&mut self) -> AbortResult {
        log::warn!("Emergency stop requested; {}.", self.status);
        if !self.status.engine_powered {
            log::info!("Roof engine is not powered; nothing to stop.");
            return AbortResult::Ok(None);
        }
        if self.motion.phase == MotionPhase::Idle
            && self.status.roof_position != RoofPosition::Unknown
        {
            let warning = format!(
                "Roof is {:?} and not moving; nothing to stop.",
                self.status.roof_position
            );
            log::warn!("{warning}");
            return AbortResult::Ok(Some(warning));
        }

        let Some(engine_relay) = self.function_map.resolve_relay(RelayFunction::RoofEnginePower)
        else {
            let error =
                RoofError::configuration("No relay is assigned to the roof engine power supply.");
            log::error!("{error}");
            return AbortResult::Alert(error.to_string());
        };
        self.motion.stop();

        log::debug!("Switching off relay number {}.", engine_relay + 1);
        let abort_result = match self.unit.write_relay(engine_relay, false).await {
            Ok(()) => {
                log::info!("Roof emergency stop - roof power supply switched off.");
                AbortResult::Ok(None)
            }
            Err(error) => {
                log::error!("Failed to switch off roof engine power: {error}");
                AbortResult::Alert(format!(
                    "Failed to switch off roof engine power relay {}: {error}",
                    engine_relay + 1
                ))
            }
        };
        self.refresh_after_command().await;
        abort_result
    }

    /// Switch an auxiliary relay (power supplies, heating, ventilation).
    ///
    /// The roof control relay is only driven through [`Self::request_move`].
    pub async fn switch_relay(&mut self, function: RelayFunction, on: bool) -> RoofResult<()> {
        if matches!(
            function,
            RelayFunction::Unused | RelayFunction::RoofControlCommand
        ) {
            return Err(RoofError::configuration(&format!(
                "{function} cannot be switched directly."
            )));
        }
        let relay = self.function_map.resolve_relay(function).ok_or_else(|| {
            RoofError::configuration(&format!("No relay is assigned to {function}."))
        })?;

        log::info!(
            "Switching {} relay number {} ({function}).",
            if on { "on" } else { "off" },
            relay + 1
        );
        self.unit.write_relay(relay, on).await?;
        self.refresh_after_command().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel_function::DigitalFunction, error::RoofErrorKind, ipx800_model::Ipx800Cmd,
        ports::fake::FakeUnit,
    };

    // Digital inputs: opened, closed, dec parked, ra parked, engine powered.
    const CLOSED_READY: &str = "01111000";
    const OPENED_READY: &str = "10111000";
    const MOVING_READY: &str = "00111000";

    fn make_selections() -> ChannelSelections {
        let mut selections = ChannelSelections::default();
        selections.relays[0] = RelayFunction::RoofEnginePower;
        selections.relays[1] = RelayFunction::RoofControlCommand;
        selections.relays[2] = RelayFunction::TubeVentilation;
        selections.digitals[0] = DigitalFunction::RoofOpened;
        selections.digitals[1] = DigitalFunction::RoofClosed;
        selections.digitals[2] = DigitalFunction::DecAxisParked;
        selections.digitals[3] = DigitalFunction::RaAxisParked;
        selections.digitals[4] = DigitalFunction::RoofEnginePowered;
        selections
    }

    async fn make_controller(digitals: &str, motion_timeout: Duration) -> RoofController<FakeUnit> {
        let mut roof_controller = RoofController::new(
            FakeUnit::with_digitals(digitals),
            FunctionMap::from_selections(&make_selections()),
            motion_timeout,
        );
        roof_controller.refresh().await.unwrap();
        roof_controller
    }

    #[tokio::test]
    async fn test_move_open_accepted() {
        let mut roof_controller = make_controller(CLOSED_READY, Duration::from_secs(20)).await;

        let move_result = roof_controller.request_move(Direction::Open).await;

        assert_eq!(move_result, MoveResult::Accepted);
        assert_eq!(roof_controller.motion().phase, MotionPhase::Opening);
        assert!(roof_controller.motion().deadline.is_some());
        assert_eq!(roof_controller.unit().writes, vec![Ipx800Cmd::SetRelay(1)]);
        // initial refresh plus the one following the command
        assert_eq!(roof_controller.unit().reads, 4);
        assert!(roof_controller.raw_state().relays[1]);
    }

    #[tokio::test]
    async fn test_move_open_rejected_mount_not_parked() {
        let mut roof_controller = make_controller("01101000", Duration::from_secs(20)).await;
        assert_eq!(
            roof_controller.status().mount_park_state,
            MountParkState::DecParked
        );

        let move_result = roof_controller.request_move(Direction::Open).await;

        assert!(matches!(move_result, MoveResult::Alert(_)));
        assert_eq!(roof_controller.motion().phase, MotionPhase::Idle);
        assert!(roof_controller.unit().writes.is_empty());
    }

    #[tokio::test]
    async fn test_move_rejected_already_at_target() {
        let mut roof_controller = make_controller(OPENED_READY, Duration::from_secs(20)).await;

        let open = roof_controller.request_move(Direction::Open).await;

        assert!(matches!(open, MoveResult::Alert(_)));
        assert!(roof_controller.unit().writes.is_empty());

        let close = roof_controller.park().await;

        assert_eq!(close, MoveResult::Accepted);
        assert_eq!(roof_controller.motion().phase, MotionPhase::Closing);
    }

    #[tokio::test]
    async fn test_move_rejected_engine_off() {
        let mut roof_controller = make_controller("01110000", Duration::from_secs(20)).await;

        let move_result = roof_controller.unpark().await;

        assert!(matches!(move_result, MoveResult::Alert(_)));
        assert!(roof_controller.unit().writes.is_empty());
    }

    #[tokio::test]
    async fn test_move_busy() {
        let mut roof_controller = make_controller(CLOSED_READY, Duration::from_secs(20)).await;
        roof_controller.request_move(Direction::Open).await;

        let move_result = roof_controller.request_move(Direction::Close).await;

        assert!(matches!(move_result, MoveResult::Busy(_)));
        assert_eq!(roof_controller.motion().phase, MotionPhase::Opening);
        assert_eq!(roof_controller.unit().writes.len(), 1);
    }

    #[tokio::test]
    async fn test_move_rejected_bad_weather() {
        let mut roof_controller = make_controller(CLOSED_READY, Duration::from_secs(20)).await;
        roof_controller.set_weather_state(WeatherState::Alert);

        let move_result = roof_controller.request_move(Direction::Open).await;

        assert!(matches!(move_result, MoveResult::Alert(_)));
        assert!(roof_controller.unit().writes.is_empty());
    }

    #[tokio::test]
    async fn test_move_rejected_control_relay_unmapped() {
        let mut roof_controller = make_controller(CLOSED_READY, Duration::from_secs(20)).await;
        roof_controller
            .set_function_mapping(1, ChannelFunction::Relay(RelayFunction::Unused))
            .unwrap();

        let move_result = roof_controller.request_move(Direction::Open).await;

        assert!(matches!(move_result, MoveResult::Alert(reason) if reason.contains("Configuration")));
        assert!(roof_controller.unit().writes.is_empty());
    }

    #[tokio::test]
    async fn test_move_write_failure_keeps_phase() {
        let mut roof_controller = make_controller(CLOSED_READY, Duration::from_secs(20)).await;
        roof_controller.unit_mut().fail_writes = true;

        let move_result = roof_controller.request_move(Direction::Open).await;

        assert!(matches!(move_result, MoveResult::Alert(_)));
        assert_eq!(roof_controller.motion().phase, MotionPhase::Opening);
    }

    #[tokio::test]
    async fn test_on_tick_confirms_open() {
        let mut roof_controller = make_controller(CLOSED_READY, Duration::from_secs(20)).await;
        roof_controller.request_move(Direction::Open).await;

        roof_controller.unit_mut().set_digitals(MOVING_READY);
        roof_controller.refresh().await.unwrap();
        assert!(matches!(roof_controller.on_tick(), MotionEvent::None));

        roof_controller.unit_mut().set_digitals(OPENED_READY);
        roof_controller.refresh().await.unwrap();
        let motion_event = roof_controller.on_tick();

        assert!(matches!(motion_event, MotionEvent::Opened));
        assert_eq!(roof_controller.motion().phase, MotionPhase::Idle);
        assert_eq!(roof_controller.is_parked(), Some(false));
    }

    #[tokio::test]
    async fn test_on_tick_confirms_close() {
        let mut roof_controller = make_controller(OPENED_READY, Duration::from_secs(20)).await;
        roof_controller.park().await;

        roof_controller.unit_mut().set_digitals(CLOSED_READY);
        roof_controller.refresh().await.unwrap();

        assert!(matches!(roof_controller.on_tick(), MotionEvent::Closed));
        assert_eq!(roof_controller.motion().deadline, None);
        assert_eq!(roof_controller.is_parked(), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_motion_timeout() {
        let mut roof_controller = make_controller(CLOSED_READY, Duration::from_secs(5)).await;
        assert_eq!(
            roof_controller.request_move(Direction::Open).await,
            MoveResult::Accepted
        );
        roof_controller.unit_mut().set_digitals(MOVING_READY);
        roof_controller.refresh().await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(matches!(roof_controller.on_tick(), MotionEvent::None));

        tokio::time::advance(Duration::from_secs(2)).await;
        let motion_event = roof_controller.on_tick();

        match motion_event {
            MotionEvent::TimedOut(error) => {
                assert_eq!(error.kind(), RoofErrorKind::MotionTimeout)
            }
            other => panic!("Expected a timeout, got {other:?}."),
        }
        assert_eq!(roof_controller.motion().phase, MotionPhase::TimedOut);
        assert_eq!(roof_controller.status().roof_position, RoofPosition::Unknown);

        // no automatic retry
        assert!(matches!(roof_controller.on_tick(), MotionEvent::None));
        assert_eq!(roof_controller.unit().writes.len(), 1);
    }

    #[tokio::test]
    async fn test_move_after_timeout() {
        let mut roof_controller = make_controller(MOVING_READY, Duration::from_secs(5)).await;
        roof_controller.request_move(Direction::Open).await;
        let deadline = roof_controller.motion().deadline.unwrap();
        roof_controller.on_tick_at(deadline + Duration::from_secs(1));
        assert_eq!(roof_controller.motion().phase, MotionPhase::TimedOut);

        let move_result = roof_controller.request_move(Direction::Close).await;

        assert_eq!(move_result, MoveResult::Accepted);
        assert_eq!(roof_controller.motion().phase, MotionPhase::Closing);
    }

    #[tokio::test]
    async fn test_abort_engine_off() {
        let mut roof_controller = make_controller("00110000", Duration::from_secs(20)).await;

        let abort_result = roof_controller.request_abort().await;

        assert_eq!(abort_result, AbortResult::Ok(None));
        assert!(roof_controller.unit().writes.is_empty());
    }

    #[tokio::test]
    async fn test_abort_at_rest() {
        let mut roof_controller = make_controller(CLOSED_READY, Duration::from_secs(20)).await;

        let abort_result = roof_controller.request_abort().await;

        assert!(matches!(abort_result, AbortResult::Ok(Some(_))));
        assert!(roof_controller.unit().writes.is_empty());
    }

    #[tokio::test]
    async fn test_abort_while_moving() {
        let mut roof_controller = make_controller(CLOSED_READY, Duration::from_secs(20)).await;
        roof_controller.request_move(Direction::Open).await;
        roof_controller.unit_mut().set_digitals(MOVING_READY);
        roof_controller.refresh().await.unwrap();
        let reads_before = roof_controller.unit().reads;

        let abort_result = roof_controller.request_abort().await;

        assert_eq!(abort_result, AbortResult::Ok(None));
        assert_eq!(roof_controller.motion().phase, MotionPhase::Idle);
        assert_eq!(roof_controller.motion().deadline, None);
        assert_eq!(
            roof_controller.unit().writes,
            vec![Ipx800Cmd::SetRelay(1), Ipx800Cmd::ClearRelay(0)]
        );
        assert_eq!(roof_controller.unit().reads, reads_before + 2);
    }

    #[tokio::test]
    async fn test_abort_engine_relay_unmapped() {
        let mut selections = make_selections();
        selections.relays[0] = RelayFunction::Unused;
        let mut roof_controller = RoofController::new(
            FakeUnit::with_digitals(CLOSED_READY),
            FunctionMap::from_selections(&selections),
            Duration::from_secs(5),
        );
        roof_controller.refresh().await.unwrap();
        assert_eq!(
            roof_controller.request_move(Direction::Open).await,
            MoveResult::Accepted
        );
        roof_controller.unit_mut().set_digitals(MOVING_READY);
        roof_controller.refresh().await.unwrap();
        let motion = roof_controller.motion();

        let abort_result = roof_controller.request_abort().await;

        assert!(matches!(abort_result, AbortResult::Alert(reason) if reason.contains("Configuration")));
        assert_eq!(roof_controller.motion(), motion);
        assert_eq!(roof_controller.unit().writes, vec![Ipx800Cmd::SetRelay(1)]);

        // the motion is still watched
        let deadline = motion.deadline.unwrap();
        let motion_event = roof_controller.on_tick_at(deadline + Duration::from_secs(1));
        assert!(matches!(motion_event, MotionEvent::TimedOut(_)));
    }

    #[tokio::test]
    async fn test_abort_after_timeout() {
        let mut roof_controller = make_controller(CLOSED_READY, Duration::from_secs(5)).await;
        roof_controller.request_move(Direction::Open).await;
        roof_controller.unit_mut().set_digitals(MOVING_READY);
        roof_controller.refresh().await.unwrap();
        let deadline = roof_controller.motion().deadline.unwrap();
        roof_controller.on_tick_at(deadline + Duration::from_secs(1));
        assert_eq!(roof_controller.motion().phase, MotionPhase::TimedOut);
        let reads_before = roof_controller.unit().reads;

        let abort_result = roof_controller.request_abort().await;

        assert_eq!(abort_result, AbortResult::Ok(None));
        assert_eq!(roof_controller.motion().phase, MotionPhase::Idle);
        assert_eq!(roof_controller.motion().deadline, None);
        assert_eq!(
            roof_controller.unit().writes,
            vec![Ipx800Cmd::SetRelay(1), Ipx800Cmd::ClearRelay(0)]
        );
        assert_eq!(roof_controller.unit().reads, reads_before + 2);
        assert!(!roof_controller.raw_state().relays[0]);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_snapshot() {
        let mut roof_controller = make_controller(CLOSED_READY, Duration::from_secs(20)).await;
        let before = roof_controller.raw_state();
        roof_controller.unit_mut().set_digitals(OPENED_READY);
        roof_controller.unit_mut().fail_reads = true;

        let refresh = roof_controller.refresh().await;

        assert!(refresh.is_err());
        assert_eq!(roof_controller.raw_state(), before);
        assert_eq!(roof_controller.status().roof_position, RoofPosition::Closed);
    }

    #[tokio::test]
    async fn test_set_function_mapping_recomputes() {
        let mut roof_controller = make_controller(CLOSED_READY, Duration::from_secs(20)).await;
        roof_controller.request_move(Direction::Open).await;

        let displaced = roof_controller
            .set_function_mapping(5, ChannelFunction::Digital(DigitalFunction::RoofClosed))
            .unwrap();

        assert_eq!(displaced, Some(1));
        assert_eq!(roof_controller.status().roof_position, RoofPosition::Unknown);
        assert_eq!(roof_controller.motion().phase, MotionPhase::Idle);
    }

    #[tokio::test]
    async fn test_switch_relay() {
        let mut roof_controller = make_controller(CLOSED_READY, Duration::from_secs(20)).await;

        roof_controller
            .switch_relay(RelayFunction::TubeVentilation, true)
            .await
            .unwrap();
        let control = roof_controller
            .switch_relay(RelayFunction::RoofControlCommand, true)
            .await;
        let unmapped = roof_controller
            .switch_relay(RelayFunction::HeatingResistor1, true)
            .await;

        assert_eq!(roof_controller.unit().writes, vec![Ipx800Cmd::SetRelay(2)]);
        assert!(roof_controller.raw_state().relays[2]);
        assert!(control.is_err());
        assert!(unmapped.is_err());
    }
}

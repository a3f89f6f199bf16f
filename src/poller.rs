//! Periodic refresh of the I/O unit state.

use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch, Mutex},
    time::{interval, MissedTickBehavior},
};

use crate::{
    ports::IoUnit,
    roof_controller::{MotionEvent, RoofController},
};

#[derive(Debug, Clone, Copy)]
pub struct Poller {
    poll_interval: Duration,
}

impl Poller {
    pub fn new(poll_interval: Duration) -> Poller {
        Poller { poll_interval }
    }

    /// Refresh the raw state and let the controller evaluate its motion.
    ///
    /// A failed refresh only skips the status update; the motion deadline
    /// is still checked.
    pub async fn tick<U: IoUnit>(roof_controller: &mut RoofController<U>) -> MotionEvent {
        if let Err(error) = roof_controller.refresh().await {
            log::warn!("Transient error refreshing I/O unit state: {error}");
        }
        roof_controller.on_tick()
    }

    /// Tick until `shutdown` turns true, forwarding motion events.
    pub async fn run<U: IoUnit>(
        &self,
        roof_controller: Arc<Mutex<RoofController<U>>>,
        event_sender: mpsc::Sender<MotionEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::debug!("Poller starting, interval {:?}.", self.poll_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let motion_event = {
                        let mut roof_controller = roof_controller.lock().await;
                        Poller::tick(&mut *roof_controller).await
                    };
                    if matches!(motion_event, MotionEvent::None) {
                        continue;
                    }
                    if event_sender.send(motion_event).await.is_err() {
                        log::debug!("Motion event receiver dropped.");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        log::debug!("Poller stopped.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel_function::{ChannelFunction, DigitalFunction, RelayFunction},
        function_map::FunctionMap,
        ports::fake::FakeUnit,
        roof_controller::{Direction, MotionPhase, MoveResult},
        status::RoofPosition,
    };

    fn make_controller(digitals: &str) -> RoofController<FakeUnit> {
        let mut function_map = FunctionMap::new();
        let assignments = [
            (0, ChannelFunction::Relay(RelayFunction::RoofEnginePower)),
            (1, ChannelFunction::Relay(RelayFunction::RoofControlCommand)),
            (0, ChannelFunction::Digital(DigitalFunction::RoofOpened)),
            (1, ChannelFunction::Digital(DigitalFunction::RoofClosed)),
            (2, ChannelFunction::Digital(DigitalFunction::DecAxisParked)),
            (3, ChannelFunction::Digital(DigitalFunction::RaAxisParked)),
            (4, ChannelFunction::Digital(DigitalFunction::RoofEnginePowered)),
        ];
        for (index, function) in assignments {
            function_map.assign(index, function).unwrap();
        }
        RoofController::new(
            FakeUnit::with_digitals(digitals),
            function_map,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_tick_refreshes_status() {
        let mut roof_controller = make_controller("01111000");

        let motion_event = Poller::tick(&mut roof_controller).await;

        assert!(matches!(motion_event, MotionEvent::None));
        assert_eq!(roof_controller.status().roof_position, RoofPosition::Closed);
        assert_eq!(roof_controller.unit().reads, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_failed_refresh_still_times_out() {
        let mut roof_controller = make_controller("00111000");
        Poller::tick(&mut roof_controller).await;
        assert_eq!(
            roof_controller.request_move(Direction::Open).await,
            MoveResult::Accepted
        );
        roof_controller.unit_mut().fail_reads = true;

        tokio::time::advance(Duration::from_secs(6)).await;
        let motion_event = Poller::tick(&mut roof_controller).await;

        assert!(matches!(motion_event, MotionEvent::TimedOut(_)));
        assert_eq!(roof_controller.motion().phase, MotionPhase::TimedOut);
    }

    #[tokio::test]
    async fn test_run_forwards_events() {
        let mut roof_controller = make_controller("01111000");
        Poller::tick(&mut roof_controller).await;
        roof_controller.request_move(Direction::Open).await;
        roof_controller.unit_mut().set_digitals("10111000");
        let roof_controller = Arc::new(Mutex::new(roof_controller));
        let (event_sender, mut event_receiver) = mpsc::channel(4);
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);

        let poller = Poller::new(Duration::from_millis(10));
        let poller_task = tokio::spawn({
            let roof_controller = roof_controller.clone();
            async move {
                poller
                    .run(roof_controller, event_sender, shutdown_receiver)
                    .await
            }
        });

        let motion_event = event_receiver.recv().await.unwrap();
        shutdown_sender.send(true).unwrap();
        poller_task.await.unwrap();

        assert!(matches!(motion_event, MotionEvent::Opened));
        assert_eq!(roof_controller.lock().await.motion().phase, MotionPhase::Idle);
    }
}

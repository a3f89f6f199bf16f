//! IPX800 mock unit wired to a simulated roll-off roof.

use std::{
    net::SocketAddr,
    sync::{Arc, Weak},
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    sync::Mutex,
    task,
    time::{sleep, Duration},
};

use crate::{
    channel_function::CHANNEL_COUNT,
    channel_parser::{format_channel_states, ChannelStates},
    error::{RoofError, RoofResult},
    ipx800_cmd_regex::Ipx800CmdRegex,
    ipx800_model::Ipx800Cmd,
    status::RoofPosition,
};

/// Size of the answer frame sent for `Get=R` and `Get=D`.
pub const FRAME_SIZE: usize = 58;

/// Emulation cycle of the simulated roof.
pub const CYCLE: Duration = Duration::from_millis(50);

pub type SharedMockUnit = Arc<Mutex<MockUnit>>;

/// Which channels of the mock unit the simulated roof is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockWiring {
    pub engine_relay: usize,
    pub control_relay: usize,
    pub opened_input: usize,
    pub closed_input: usize,
    pub dec_parked_input: usize,
    pub ra_parked_input: usize,
    pub engine_powered_input: usize,
}

impl Default for MockWiring {
    fn default() -> Self {
        MockWiring {
            engine_relay: 0,
            control_relay: 1,
            opened_input: 0,
            closed_input: 1,
            dec_parked_input: 2,
            ra_parked_input: 3,
            engine_powered_input: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockUnit {
    pub relays: ChannelStates,
    pub digitals: ChannelStates,
    /// Every command received, in order.
    pub received: Vec<Ipx800Cmd>,
    /// Number of upcoming `Get` answers to garble.
    pub corrupt_replies: usize,
    /// Cycles needed for a full opening or closing.
    pub travel_cycles: u32,
    wiring: MockWiring,
    last_target: RoofPosition,
    travel: Option<(RoofPosition, u32)>,
}

impl MockUnit {
    /// A closed roof, parked mount and powered roof engine.
    pub fn new(wiring: MockWiring, travel_cycles: u32) -> MockUnit {
        let mut mock_unit = MockUnit {
            relays: [false; CHANNEL_COUNT],
            digitals: [false; CHANNEL_COUNT],
            received: Vec::new(),
            corrupt_replies: 0,
            travel_cycles,
            wiring,
            last_target: RoofPosition::Closed,
            travel: None,
        };
        mock_unit.relays[wiring.engine_relay] = true;
        mock_unit.digitals[wiring.closed_input] = true;
        mock_unit.set_mount_parked(true);
        mock_unit.update_engine_input();
        mock_unit
    }

    pub fn wiring(&self) -> MockWiring {
        self.wiring
    }

    pub fn set_mount_parked(&mut self, parked: bool) {
        self.digitals[self.wiring.dec_parked_input] = parked;
        self.digitals[self.wiring.ra_parked_input] = parked;
    }

    pub fn roof_position(&self) -> RoofPosition {
        match (
            self.digitals[self.wiring.opened_input],
            self.digitals[self.wiring.closed_input],
        ) {
            (true, false) => RoofPosition::Opened,
            (false, true) => RoofPosition::Closed,
            _ => RoofPosition::Unknown,
        }
    }

    /// Relay commands received so far, without the reads.
    pub fn relay_commands(&self) -> Vec<Ipx800Cmd> {
        self.received
            .iter()
            .filter(|cmd| matches!(cmd, Ipx800Cmd::SetRelay(_) | Ipx800Cmd::ClearRelay(_)))
            .copied()
            .collect()
    }

    /// Apply one command and return the answer to send, if any.
    pub fn apply(&mut self, ipx800_cmd: Ipx800Cmd) -> Option<Vec<u8>> {
        self.received.push(ipx800_cmd);
        match ipx800_cmd {
            Ipx800Cmd::GetRelays => Some(self.make_frame(self.relays)),
            Ipx800Cmd::GetDigitals => Some(self.make_frame(self.digitals)),
            Ipx800Cmd::SetRelay(index) => {
                let was_on = self.relays[index];
                self.relays[index] = true;
                if index == self.wiring.control_relay && !was_on {
                    self.start_travel();
                }
                self.update_engine_input();
                None
            }
            Ipx800Cmd::ClearRelay(index) => {
                self.relays[index] = false;
                self.update_engine_input();
                None
            }
        }
    }

    fn make_frame(&mut self, states: ChannelStates) -> Vec<u8> {
        let mut frame = if self.corrupt_replies > 0 {
            self.corrupt_replies -= 1;
            b"ERR?".to_vec()
        } else {
            format_channel_states(&states).into_bytes()
        };
        frame.resize(FRAME_SIZE - 2, b' ');
        frame.extend_from_slice(b"\r\n");
        frame
    }

    fn update_engine_input(&mut self) {
        self.digitals[self.wiring.engine_powered_input] = self.relays[self.wiring.engine_relay];
    }

    fn start_travel(&mut self) {
        if !self.relays[self.wiring.engine_relay] {
            log::debug!("Mock roof engine not powered; ignoring control pulse.");
            return;
        }
        let target = match self.roof_position() {
            RoofPosition::Closed => RoofPosition::Opened,
            RoofPosition::Opened => RoofPosition::Closed,
            RoofPosition::Unknown => match self.last_target {
                RoofPosition::Opened => RoofPosition::Closed,
                _ => RoofPosition::Opened,
            },
        };
        log::debug!("Mock roof travelling to {target:?}.");
        self.last_target = target;
        self.travel = Some((target, self.travel_cycles));
        self.digitals[self.wiring.opened_input] = false;
        self.digitals[self.wiring.closed_input] = false;
    }

    /// Advance the simulated roof by one cycle.
    pub fn step(&mut self) {
        // The control relay behaves as an impulse relay.
        self.relays[self.wiring.control_relay] = false;

        let Some((target, cycles_left)) = self.travel else {
            return;
        };
        if !self.relays[self.wiring.engine_relay] {
            log::debug!("Mock roof engine switched off; roof stopped.");
            self.travel = None;
            return;
        }
        if cycles_left > 0 {
            self.travel = Some((target, cycles_left - 1));
            return;
        }
        self.travel = None;
        match target {
            RoofPosition::Opened => self.digitals[self.wiring.opened_input] = true,
            _ => self.digitals[self.wiring.closed_input] = true,
        }
        log::debug!("Mock roof reached {target:?}.");
    }
}

/// Run the roof emulation until the shared unit is dropped.
pub fn spawn_emulation(mock_unit: &SharedMockUnit, cycle: Duration) -> task::JoinHandle<()> {
    let mock_unit: Weak<Mutex<MockUnit>> = Arc::downgrade(mock_unit);
    task::spawn(async move {
        loop {
            let Some(mock_unit) = mock_unit.upgrade() else {
                break;
            };
            mock_unit.lock().await.step();
            drop(mock_unit);
            sleep(cycle).await;
        }
    })
}

/// Answer commands on one connection until the peer closes it.
pub async fn serve_connection<S>(
    mut socket: S,
    mock_unit: SharedMockUnit,
    ipx800_cmd_regex: &Ipx800CmdRegex,
) -> RoofResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0; 1024];
    let mut pending = String::new();

    loop {
        let n_bytes = socket.read(&mut buf).await?;
        // Return value of `Ok(0)` signifies that the remote has closed
        if n_bytes == 0 {
            return Ok(());
        }
        pending.push_str(&String::from_utf8_lossy(&buf[..n_bytes]));

        let (commands, consumed) = ipx800_cmd_regex.split_commands(&pending);
        for ipx800_cmd in commands {
            let Some(ipx800_cmd) = ipx800_cmd else {
                log::warn!("Mock unit received a command for an unknown relay.");
                continue;
            };
            log::debug!("Mock unit received {}.", ipx800_cmd.get_command());
            let reply = mock_unit.lock().await.apply(ipx800_cmd);
            if let Some(reply) = reply {
                socket.write_all(&reply).await?;
            }
        }
        pending.drain(..consumed);
        if pending.len() > 64 {
            log::warn!("Mock unit dropping unknown input: {pending:?}.");
            pending.clear();
        }
    }
}

async fn accept_connections(
    listener: TcpListener,
    mock_unit: SharedMockUnit,
    ipx800_cmd_regex: Arc<Ipx800CmdRegex>,
) -> RoofResult<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        socket.set_nodelay(true)?;
        log::info!("Mock I/O unit accepted connection from {peer}.");
        let mock_unit = mock_unit.clone();
        let ipx800_cmd_regex = ipx800_cmd_regex.clone();
        task::spawn(async move {
            if let Err(error) = serve_connection(socket, mock_unit, &ipx800_cmd_regex).await {
                log::warn!("Mock I/O unit connection from {peer} failed: {error}");
            }
        });
    }
}

/// Bind the mock unit and serve connections in the background.
pub async fn start_mock_controller(
    address: &str,
    mock_unit: SharedMockUnit,
) -> RoofResult<(SocketAddr, task::JoinHandle<RoofResult<()>>)> {
    let listener = TcpListener::bind(address).await?;
    let local_addr = listener.local_addr()?;
    let ipx800_cmd_regex = Arc::new(Ipx800CmdRegex::new()?);
    log::info!("Mock I/O unit listening on {local_addr}.");

    let accept_task = task::spawn(accept_connections(listener, mock_unit, ipx800_cmd_regex));

    Ok((local_addr, accept_task))
}

/// Serve a simulated roof on `host:port` forever.
pub async fn run_mock_controller(host: &str, port: u16, travel_cycles: u32) -> RoofResult<()> {
    let mock_unit = Arc::new(Mutex::new(MockUnit::new(
        MockWiring::default(),
        travel_cycles,
    )));
    let emulation_task = spawn_emulation(&mock_unit, CYCLE);
    let (_, accept_task) = start_mock_controller(&format!("{host}:{port}"), mock_unit).await?;

    let result = match accept_task.await {
        Ok(result) => result,
        Err(error) => Err(RoofError::communication(&format!(
            "Mock I/O unit task failed: {error}"
        ))),
    };
    emulation_task.abort();
    result
}

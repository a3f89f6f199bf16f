use clap::{Parser, Subcommand};
use rolloff_ipx800::{
    config::Settings,
    console::Console,
    function_map::FunctionMap,
    ipx800_model::Ipx800Link,
    logger::init_logger,
    mock_controller::mock_controller::run_mock_controller,
    poller::Poller,
    roof_controller::{MotionEvent, RoofController},
};

use std::{error::Error, path::PathBuf, sync::Arc};
use tokio::{
    io::{stdin, stdout, BufReader},
    sync::{mpsc, watch, Mutex},
    task,
};

/// Roll-off roof driver for an IPX800 relay and digital input unit.
#[derive(Parser, Debug)]
#[command(name = "rolloff-ipx800")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to the I/O unit, poll it and read commands from stdin.
    Run {
        /// TOML configuration file; defaults are used when it does not exist.
        #[arg(short, long, default_value = "rolloff-ipx800.toml")]
        config: PathBuf,
    },
    /// Serve a simulated I/O unit wired to a roll-off roof.
    Mock {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(short, long, default_value_t = 666)]
        port: u16,
        /// Emulation cycles (50 ms each) of a full roof travel.
        #[arg(long, default_value_t = 100)]
        travel_cycles: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command {
        Command::Run { config } => run(config).await?,
        Command::Mock {
            host,
            port,
            travel_cycles,
        } => {
            init_logger("info");
            run_mock_controller(&host, port, travel_cycles).await?;
        }
    }

    Ok(())
}

async fn run(config: PathBuf) -> Result<(), Box<dyn Error>> {
    let settings = if config.exists() {
        Settings::load(&config)?
    } else {
        Settings::default()
    };
    init_logger(&settings.env.log_level);
    log::info!("Using configuration {}.", config.display());

    let link = Ipx800Link::connect(&settings.link).await?;
    let roof_controller = Arc::new(Mutex::new(RoofController::new(
        link,
        FunctionMap::from_selections(&settings.channels),
        settings.roof.motion_timeout(),
    )));

    let (event_sender, mut event_receiver) = mpsc::channel(16);
    let (shutdown_sender, shutdown_receiver) = watch::channel(false);

    let poller = Poller::new(settings.roof.poll_interval());
    let poller_task = task::spawn({
        let roof_controller = roof_controller.clone();
        async move {
            poller
                .run(roof_controller, event_sender, shutdown_receiver)
                .await
        }
    });

    let event_task = task::spawn(async move {
        while let Some(motion_event) = event_receiver.recv().await {
            match motion_event {
                MotionEvent::Opened => println!("event: roof opened"),
                MotionEvent::Closed => println!("event: roof closed"),
                MotionEvent::TimedOut(error) => println!("event: {error}"),
                MotionEvent::None => {}
            }
        }
    });

    let mut console = Console::new(settings, Some(config));
    let console_result = console
        .run(BufReader::new(stdin()), stdout(), roof_controller)
        .await;

    shutdown_sender.send(true)?;
    poller_task.await?;
    event_task.await?;

    Ok(console_result?)
}

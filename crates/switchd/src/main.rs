//! switchd - management daemon for the MISL 100BaseTX switch layer.
//!
//! Entry point: wires the simulated board devices, restores the persisted
//! configuration, and spawns the CLI interpreter, I²C dispatcher, port
//! monitor and event logger tasks.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use switch_hal::sim::{SimControllerBus, SimEepromBus};
use switch_hal::EventSink;
use switchd::cli::Interpreter;
use switchd::console::{Console, StdoutSink};
use switchd::event_log::{self, EventLogger};
use switchd::i2c::{self, I2cDispatcher, SlaveEndpoint};
use switchd::monitor::PortMonitor;
use switchd::{persist, Ctx, DaemonConfig, Devices, SystemState};
use switch_types::{regs, EventCode};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[command(name = "switchd", about = "MISL switch layer management daemon")]
struct Args {
    /// Path to a JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Initializes tracing/logging subsystem
fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Feeds console bytes from stdin on a blocking thread.
fn spawn_stdin_reader(tx: mpsc::Sender<u8>) {
    std::thread::spawn(move || {
        use std::io::Read;
        let stdin = std::io::stdin();
        for byte in stdin.lock().bytes().map_while(Result::ok) {
            if tx.blocking_send(byte).is_err() {
                break;
            }
        }
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => match DaemonConfig::from_file(path) {
            Ok(config) => config,
            Err(err) => {
                error!("bad configuration: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => DaemonConfig::default(),
    };

    info!("--- Starting switchd ---");

    let (log_tx, log_rx) = event_log::channel();
    let events = EventSink::new(log_tx);

    // A task fault is the host-side analog of the kernel's overflow hook:
    // report it, queue the log record, and let the runtime unwind.
    let fault_events = events.clone();
    std::panic::set_hook(Box::new(move |info| {
        fault_events.record(EventCode::StackOverflow);
        eprintln!("task fault: {info}");
    }));
    let devices = Devices::new(
        Box::new(SimEepromBus::new()),
        Box::new(SimControllerBus::new()),
        events.clone(),
    );

    let (byte_tx, byte_rx) = mpsc::channel(512);
    let console = Arc::new(Console::new(byte_rx, Box::new(StdoutSink)));
    console.set_echo(config.echo);
    spawn_stdin_reader(byte_tx);

    let state = SystemState::shared(&config);

    let (i2c_event_tx, i2c_event_rx) = mpsc::channel(64);
    let (packet_tx, packet_rx) = i2c::packet_channel();
    let (response_tx, mut response_rx) = mpsc::channel::<u8>(512);
    tokio::spawn(async move {
        // The master side of the loopback; mirror responses into the trace.
        while let Some(byte) = response_rx.recv().await {
            debug!("Value read back from slave: {byte:02X}");
        }
    });

    let ctx = Ctx {
        devices: devices.clone(),
        console: console.clone(),
        state: state.clone(),
        events: events.clone(),
        i2c_loopback: Some(i2c_event_tx),
    };

    // Restore the persisted configuration before any task runs.
    if let Err(err) = persist::restore_on_boot(&ctx).await {
        warn!("boot restore incomplete: {err}");
    }
    ctx.events.record(EventCode::SystemRestarted);

    // Start the controller and prepare the expansion port for cascading.
    let boot_regs: [(u8, u8); 5] = [
        (regs::CHIP_ID1, 0x01),
        (0x59, 0x00),
        (0x83, 0xB0),
        (0x84, 0x70),
        (0x86, 0x30),
    ];
    for (reg, value) in boot_regs {
        if let Err(err) = ctx.controller().write(reg, value).await {
            error!("controller bring-up failed at 0x{reg:02X}: {err}");
            return ExitCode::FAILURE;
        }
    }
    console.write("[BOOTING]: Started Ethernet Controller\n");
    console.write("[BOOTING]: Configured Port 5 for expansion\n");

    // Console attach drops any active session back to the login prompt.
    #[cfg(unix)]
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut hangup = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
            {
                Ok(signal) => signal,
                Err(err) => {
                    warn!("console attach signal unavailable: {err}");
                    return;
                }
            };
            while hangup.recv().await.is_some() {
                let mut state = state.write().await;
                state.authenticated = false;
                state.active_user = None;
                info!("console attach; session reset");
            }
        });
    }

    tokio::spawn(SlaveEndpoint::new(i2c_event_rx, packet_tx).run());
    tokio::spawn(I2cDispatcher::new(ctx.clone(), packet_rx, response_tx).run());
    tokio::spawn(PortMonitor::new(ctx.clone()).run());
    tokio::spawn(
        EventLogger::new(log_rx, devices, state, tokio::time::Instant::now()).run(),
    );

    Interpreter::new(ctx).run().await;

    info!("console closed; switchd exiting");
    ExitCode::SUCCESS
}

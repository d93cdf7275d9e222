use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use commstream::config::{Config, ConfigLoader, LogFormat};
use commstream::events::{self, MonitorEvent};
use commstream::pipeline::{spawn_receive, DisplayHandle};
use commstream::port::{share, SystemSerialChannel};
use commstream::sequencer::{self, CommandSpec};

/// Headless serial monitor: stream timestamped lines from a port and
/// optionally drive a paced command list against it.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Serial port to open (e.g. /dev/ttyUSB0 or COM3)
    #[arg(required_unless_present = "list")]
    port: Option<String>,

    /// Baud rate (overrides configuration)
    #[arg(short, long)]
    baud: Option<u32>,

    /// Render received bytes as hex
    #[arg(long)]
    hex: bool,

    /// Disable timestamp prefixes
    #[arg(long)]
    no_timestamps: bool,

    /// Escape control characters in text mode
    #[arg(long)]
    control_symbols: bool,

    /// Explicit configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File with one command per line to send through the sequencer
    #[arg(short, long)]
    send: Option<PathBuf>,

    /// Spacing between commands in milliseconds (0 selects the settle floor)
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// How many times to run the command list
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// List available serial ports and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?.into_config(),
        None => ConfigLoader::load()?.into_config(),
    };
    init_logging(&config);

    if args.list {
        return list_ports();
    }

    // CLI flags win over file/env configuration.
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if args.hex {
        config.display.hex = true;
    }
    if args.no_timestamps {
        config.display.timestamps = false;
    }
    if args.control_symbols {
        config.display.control_symbols = true;
    }

    let port_name = args.port.as_deref().unwrap_or_default();
    let channel = SystemSerialChannel::open(port_name, config.serial.settings())?;
    info!(port = port_name, baud = config.serial.baud_rate, "port opened");
    let channel = share(Box::new(channel));

    let display = DisplayHandle::new(config.display.options());
    let (tx, rx) = events::channel();

    let receiver = spawn_receive(
        channel.clone(),
        display,
        tx.clone(),
        config.receive.tuning(),
    );

    let _sequencer = match &args.send {
        Some(path) => {
            let commands = load_commands(path, args.interval_ms)?;
            info!(
                commands = commands.len(),
                repeat = args.repeat,
                "starting command sequence"
            );
            Some(sequencer::spawn(
                channel,
                commands,
                args.repeat,
                config.sequence.sequence_config(),
                tx,
            ))
        }
        None => {
            drop(tx);
            None
        }
    };

    for event in rx {
        match event {
            MonitorEvent::Data(batch) => println!("{batch}"),
            MonitorEvent::ConnectionFailure(kind) => {
                warn!(%kind, "connection failure");
                if kind == commstream::FailureKind::Closed {
                    break;
                }
            }
            MonitorEvent::CommandExecuted(index) => info!(index, "command executed"),
            MonitorEvent::CommandFailed(index) => warn!(index, "command failed"),
            MonitorEvent::RepeatsRemaining(remaining) => info!(remaining, "pass finished"),
            MonitorEvent::SequenceFinished(outcome) => info!(?outcome, "sequence finished"),
        }
    }

    receiver.join();
    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

fn list_ports() -> Result<(), Box<dyn std::error::Error>> {
    let ports = serialport::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    for port in ports {
        match port.port_type {
            serialport::SerialPortType::UsbPort(info) => {
                println!(
                    "{}  USB {:04x}:{:04x} {}",
                    port.port_name,
                    info.vid,
                    info.pid,
                    info.product.unwrap_or_default()
                );
            }
            other => println!("{}  {:?}", port.port_name, other),
        }
    }
    Ok(())
}

/// Read a command file: one command per line, `#` comments and blank
/// lines skipped.
fn load_commands(
    path: &PathBuf,
    interval_ms: u64,
) -> Result<Vec<CommandSpec>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let commands = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .enumerate()
        .map(|(i, text)| CommandSpec {
            index: i + 1,
            text: text.to_string(),
            interval_ms,
            append_terminator: true,
        })
        .collect();
    Ok(commands)
}

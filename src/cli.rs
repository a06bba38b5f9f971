use crate::camera::list_devices;
use crate::config::{default_endpoint, RelayConfig, DEFAULT_INTERVAL_MS, DEFAULT_QUALITY};
use crate::daemon::run_daemon;
use crate::ipc::{send_command, ControlMessage};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "face-relay",
    version,
    about = "Webcam frame relay for a remote inference service"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture frames and relay them to the inference endpoint
    Run {
        /// Acknowledge that the camera will be opened and frames uploaded
        #[arg(long)]
        consent: bool,
        /// Inference endpoint URL (falls back to FACE_RELAY_ENDPOINT)
        #[arg(short, long)]
        endpoint: Option<String>,
        /// Capture device index
        #[arg(short, long, default_value_t = 0)]
        camera: u32,
        /// Milliseconds between a settled round-trip and the next capture
        #[arg(short, long, default_value_t = DEFAULT_INTERVAL_MS)]
        interval: u64,
        /// Requested capture size, as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size, default_value = "1280x720")]
        size: (u32, u32),
        /// JPEG quality of the uploaded frames (1-100)
        #[arg(short, long, default_value_t = DEFAULT_QUALITY)]
        quality: u8,
        /// Write each annotated frame to this path
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Control a running relay
    Ctl {
        #[command(subcommand)]
        ctl: CtlSubcommand,
    },
    /// List capture devices
    Devices,
}

#[derive(Subcommand)]
pub enum CtlSubcommand {
    /// Change the delay between round-trips
    Interval { ms: u64 },
    /// Stop the relay
    Stop,
    /// Print the relay's status
    Status,
}

pub fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let width = w.parse().map_err(|_| format!("bad width {w:?}"))?;
    let height = h.parse().map_err(|_| format!("bad height {h:?}"))?;
    Ok((width, height))
}

pub fn run_cli() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    execute(cli);
}

pub fn execute(cli: Cli) {
    match cli.command {
        Commands::Run {
            consent,
            endpoint,
            camera,
            interval,
            size,
            quality,
            save,
        } => {
            let config = RelayConfig {
                consent,
                endpoint: endpoint.unwrap_or_else(default_endpoint),
                camera_index: camera,
                interval_ms: interval,
                width: size.0,
                height: size.1,
                quality,
                save,
            }
            .normalized();
            run_daemon(config);
        }
        Commands::Ctl { ctl } => match ctl {
            CtlSubcommand::Interval { ms } => match send_command(ControlMessage::SetInterval(ms)) {
                Ok(_) => info!(interval_ms = ms, "interval updated"),
                Err(e) => error!("failed to reach the relay: {e}"),
            },
            CtlSubcommand::Stop => match send_command(ControlMessage::Stop) {
                Ok(_) => info!("stop requested"),
                Err(e) => error!("failed to reach the relay: {e}"),
            },
            CtlSubcommand::Status => match send_command(ControlMessage::Status) {
                Ok(Some(reply)) => println!("{reply}"),
                Ok(None) => error!("relay returned no status"),
                Err(e) => error!("failed to reach the relay: {e}"),
            },
        },
        Commands::Devices => {
            for line in list_devices() {
                println!("{line}");
            }
        }
    }
}

pub mod camera;
pub mod cli;
pub mod client;
pub mod config;
pub mod daemon;
pub mod error;
pub mod ipc;
pub mod overlay;
pub mod protocol;
pub mod relay;
pub mod state;
pub mod surface;

pub use cli::{execute, run_cli, Cli, Commands, CtlSubcommand};
pub use config::RelayConfig;
pub use error::{CaptureError, StartError, TransportError};
pub use relay::{RelayController, RelayHandle, StatusSnapshot};

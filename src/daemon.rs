use crate::config::RelayConfig;
use crate::ipc::{socket_path, ControlMessage};
use crate::relay::RelayController;
use std::fs;
use std::os::unix::net::UnixListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace};

/// Runs the relay in the foreground: starts a capture session, serves the
/// control socket, and tears everything down on Ctrl+C, a `Stop` message, or
/// the capture loop dying on its own. The camera is released before this
/// returns on every path.
pub fn run_daemon(config: RelayConfig) {
    let mut controller = RelayController::new();
    let handle = match controller.start(&config) {
        Ok(handle) => handle,
        Err(e) => {
            error!("failed to start relay: {e}");
            return;
        }
    };
    info!(endpoint = %config.endpoint, interval_ms = config.interval_ms, "relay started");

    let shutdown = Arc::new(AtomicBool::new(false));
    let signal_flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || signal_flag.store(true, Ordering::SeqCst)) {
        error!("failed to install signal handler: {e}");
    }

    let sock_path = socket_path();
    if fs::remove_file(&sock_path).is_ok() {
        trace!(path = %sock_path.display(), "removed stale socket");
    }
    let listener = match UnixListener::bind(&sock_path) {
        Ok(l) => {
            debug!(path = %sock_path.display(), "control socket bound");
            l
        }
        Err(e) => {
            error!("failed to bind control socket: {e}");
            controller.stop();
            return;
        }
    };

    let ipc_handle = handle.clone();
    let ipc_shutdown = shutdown.clone();
    debug!("starting IPC thread");
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(mut s) => match serde_json::from_reader::<_, ControlMessage>(&mut s) {
                    Ok(msg) => {
                        debug!(?msg, "control message received");
                        match msg {
                            ControlMessage::SetInterval(ms) => ipc_handle.set_interval(ms),
                            ControlMessage::Stop => {
                                ipc_shutdown.store(true, Ordering::SeqCst);
                                ipc_handle.request_stop();
                            }
                            ControlMessage::Status => {
                                if let Err(e) = serde_json::to_writer(&mut s, &ipc_handle.status())
                                {
                                    error!("failed to write status reply: {e}");
                                }
                            }
                        }
                    }
                    Err(e) => error!("malformed control message: {e}"),
                },
                Err(e) => error!("failed to accept connection: {e}"),
            }
        }
    });

    while !shutdown.load(Ordering::SeqCst) && handle.is_active() {
        std::thread::sleep(Duration::from_millis(200));
    }

    controller.stop();
    if fs::remove_file(&sock_path).is_ok() {
        trace!(path = %sock_path.display(), "removed socket");
    }
    info!("daemon stopped");
}

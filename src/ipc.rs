use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::{env, io};

/// Control-plane messages for a running relay. `Status` is the only message
/// that gets a reply.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub enum ControlMessage {
    SetInterval(u64),
    Stop,
    Status,
}

pub fn socket_path() -> PathBuf {
    if let Some(path) = env::var_os("FACE_RELAY_SOCKET") {
        return PathBuf::from(path);
    }
    if let Some(dir) = env::var_os("XDG_RUNTIME_DIR") {
        return PathBuf::from(dir).join("face-relay.sock");
    }
    env::temp_dir().join("face-relay.sock")
}

pub fn send_command(msg: ControlMessage) -> io::Result<Option<String>> {
    let mut stream = UnixStream::connect(socket_path())?;
    serde_json::to_writer(&mut stream, &msg)?;
    stream.flush()?;
    let _ = stream.shutdown(Shutdown::Write);

    if matches!(msg, ControlMessage::Status) {
        let mut buf = String::new();
        stream.read_to_string(&mut buf)?;
        Ok(Some(buf))
    } else {
        Ok(None)
    }
}

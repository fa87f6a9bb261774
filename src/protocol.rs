//! Messages exchanged with the daemon over its local socket.
//!
//! Every message is a TOML document `message = ...`, base64 encoded so it fits
//! on a single line, followed by a newline.

use std::io::{BufRead, Write};

use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    alarm::{AlarmId, AlarmView},
    communication::Event,
    error::{Error, Result},
};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    AddAlarm(String),
    RemoveAlarm(AlarmId),
    ListAlarms,
    StopAlarm,
    /// turns the connection into a stream of alarm events
    Subscribe,
    Shutdown,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Alarms(Vec<AlarmView>),
    Stopped(AlarmId),
    NothingRinging,
    Subscribed,
    ShuttingDown,
    Error { kind: String, message: String },
    AlarmTriggered(AlarmId),
    AlarmStopped(AlarmId),
}

impl From<Event> for ServerMessage {
    fn from(event: Event) -> Self {
        match event {
            Event::AlarmTriggered(id) => Self::AlarmTriggered(id),
            Event::AlarmStopped(id) => Self::AlarmStopped(id),
        }
    }
}

impl From<&Error> for ServerMessage {
    fn from(error: &Error) -> Self {
        Self::Error {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    message: T,
}

/// Writes one framed message.
///
/// # Errors
/// If the message can't be serialized or the write fails.
pub fn send<T: Serialize>(writer: &mut impl Write, message: &T) -> Result<()> {
    let document = toml::to_string(&Envelope { message })?;
    writeln!(writer, "{}", BASE64_STANDARD.encode(document.as_bytes()))?;
    writer.flush()?;
    Ok(())
}

/// Reads one framed message, `None` once the other side has hung up.
///
/// # Errors
/// If the read fails or the line isn't a valid message.
pub fn receive<T: DeserializeOwned>(reader: &mut impl BufRead) -> Result<Option<T>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let bytes = BASE64_STANDARD
        .decode(line.trim_end())
        .map_err(|e| Error::Protocol(format!("bad base64: {e}")))?;
    let document =
        String::from_utf8(bytes).map_err(|e| Error::Protocol(format!("bad utf-8: {e}")))?;
    let envelope: Envelope<T> = toml::from_str(&document)?;
    Ok(Some(envelope.message))
}

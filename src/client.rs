//! Talking to a running daemon.

use std::io::BufReader;

use interprocess::local_socket::{prelude::*, GenericNamespaced, Stream};

use crate::{
    error::{Error, Result},
    protocol::{self, ClientMessage, ServerMessage},
};

#[derive(Debug)]
pub struct Client {
    conn: BufReader<Stream>,
}

impl Client {
    /// # Errors
    /// If no daemon is listening on `socket_name`.
    pub fn connect(socket_name: &str) -> Result<Self> {
        let name = socket_name.to_ns_name::<GenericNamespaced>()?;
        let conn = Stream::connect(name)?;
        Ok(Self {
            conn: BufReader::new(conn),
        })
    }

    /// Sends a request and waits for its answer.
    ///
    /// # Errors
    /// If the connection fails, or the daemon hangs up or answers with an error.
    pub fn request(&mut self, message: &ClientMessage) -> Result<ServerMessage> {
        protocol::send(self.conn.get_mut(), message)?;
        match self.next_message()? {
            ServerMessage::Error { kind, message } => {
                Err(Error::Protocol(format!("{kind}: {message}")))
            }
            reply => Ok(reply),
        }
    }

    /// Waits for the next message, for reading the event stream after subscribing.
    ///
    /// # Errors
    /// If the connection fails or the daemon hung up.
    pub fn next_message(&mut self) -> Result<ServerMessage> {
        protocol::receive(&mut self.conn)?
            .ok_or_else(|| Error::Protocol("daemon closed the connection".to_string()))
    }
}

//! The daemon side of the local socket.

use std::{
    io::{self, BufReader, Write},
    thread,
};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use interprocess::local_socket::{
    prelude::*, GenericNamespaced, Listener, ListenerOptions, RecvHalf, Stream,
};
use log::{debug, error, info, warn};

use crate::{
    commands::AlarmClock,
    error::Result,
    protocol::{self, ClientMessage, ServerMessage},
};

/// What to do after answering a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Respond(ServerMessage),
    /// confirm and start streaming events on this connection
    Subscribe,
    /// confirm and stop the daemon
    Shutdown,
}

/// Runs a single request against the alarm clock.
#[must_use]
pub fn dispatch(clock: &AlarmClock, message: ClientMessage) -> Reply {
    let response = match message {
        ClientMessage::AddAlarm(time) => clock.add_alarm(&time).map(ServerMessage::Alarms),
        ClientMessage::RemoveAlarm(id) => clock.remove_alarm(id).map(ServerMessage::Alarms),
        ClientMessage::ListAlarms => Ok(ServerMessage::Alarms(clock.list_alarms())),
        ClientMessage::StopAlarm => Ok(clock
            .stop_alarm()
            .map_or(ServerMessage::NothingRinging, ServerMessage::Stopped)),
        ClientMessage::Subscribe => return Reply::Subscribe,
        ClientMessage::Shutdown => return Reply::Shutdown,
    };
    Reply::Respond(response.unwrap_or_else(|e| {
        info!("request failed: {e}");
        ServerMessage::from(&e)
    }))
}

/// Binds the daemon's socket.
///
/// # Errors
/// If the name is invalid or the socket is already in use.
pub fn bind(socket_name: &str) -> io::Result<Listener> {
    let name = socket_name.to_ns_name::<GenericNamespaced>()?;
    let listener = match ListenerOptions::new().name(name).create_sync() {
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
            error!("could not start server because {socket_name} is in use, is another daemon running?");
            return Err(e);
        }
        x => x?,
    };
    info!("listening on {socket_name}");
    Ok(listener)
}

#[derive(Debug)]
pub struct Server {
    clock: AlarmClock,
    shutdown: Sender<()>,
}

impl Server {
    /// `shutdown` receives a message when a client asks the daemon to stop
    #[must_use]
    pub const fn new(clock: AlarmClock, shutdown: Sender<()>) -> Self {
        Self { clock, shutdown }
    }

    /// Accepts connections forever, serving each on its own thread.
    pub fn run(self, listener: &Listener) {
        for conn in listener.incoming().filter_map(handle_error) {
            let clock = self.clock.clone();
            let shutdown = self.shutdown.clone();
            let spawned = thread::Builder::new()
                .name("alarm-connection".to_string())
                .spawn(move || {
                    if let Err(e) = serve(&clock, &shutdown, conn) {
                        warn!("connection closed with an error: {e}");
                    }
                });
            if let Err(e) = spawned {
                error!("couldn't spawn a connection thread: {e}");
            }
        }
    }
}

fn handle_error(conn: io::Result<Stream>) -> Option<Stream> {
    match conn {
        Ok(c) => Some(c),
        Err(e) => {
            warn!("incoming connection failed: {e}");
            None
        }
    }
}

fn serve(clock: &AlarmClock, shutdown: &Sender<()>, conn: Stream) -> Result<()> {
    debug!("incoming connection");
    let (recv, mut send) = conn.split();
    let mut recv = BufReader::new(recv);
    while let Some(message) = protocol::receive::<ClientMessage>(&mut recv)? {
        debug!("got {message:?}");
        match dispatch(clock, message) {
            Reply::Respond(response) => protocol::send(&mut send, &response)?,
            Reply::Subscribe => {
                protocol::send(&mut send, &ServerMessage::Subscribed)?;
                let hangup = watch_for_hangup(recv)?;
                return stream_events(clock, &mut send, &hangup);
            }
            Reply::Shutdown => {
                info!("shutdown requested");
                protocol::send(&mut send, &ServerMessage::ShuttingDown)?;
                // a full channel means shutdown is already under way
                let _ = shutdown.try_send(());
                return Ok(());
            }
        }
    }
    debug!("client hung up");
    Ok(())
}

/// Keeps reading a subscribed connection on its own thread. The returned
/// receiver disconnects once the client closes its end.
fn watch_for_hangup(mut recv: BufReader<RecvHalf>) -> io::Result<Receiver<()>> {
    let (hung_up, hangup) = bounded::<()>(0);
    thread::Builder::new()
        .name("alarm-watch-reader".to_string())
        .spawn(move || {
            loop {
                match protocol::receive::<ClientMessage>(&mut recv) {
                    Ok(Some(message)) => debug!("ignoring {message:?} on a watch connection"),
                    Ok(None) => break,
                    Err(e) => {
                        debug!("watch connection read failed: {e}");
                        break;
                    }
                }
            }
            drop(hung_up);
        })?;
    Ok(hangup)
}

/// Forwards events until the client goes away, then unsubscribes.
fn stream_events(
    clock: &AlarmClock,
    conn: &mut impl Write,
    hangup: &Receiver<()>,
) -> Result<()> {
    let (subscription, events) = clock.subscribe();
    loop {
        let event = select! {
            recv(events) -> event => event.ok(),
            recv(hangup) -> _ => {
                info!("subscriber hung up");
                None
            }
        };
        let Some(event) = event else {
            break;
        };
        if let Err(e) = protocol::send(conn, &ServerMessage::from(event)) {
            info!("subscriber went away: {e}");
            break;
        }
    }
    clock.unsubscribe(subscription);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use chrono::NaiveDate;

    use super::*;
    use crate::{alarm::AlarmView, client::Client, clock::ManualClock};

    fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn dispatches_the_alarm_scenario() {
        let clock = AlarmClock::new();
        assert_eq!(
            dispatch(&clock, ClientMessage::AddAlarm("07:15:00".to_string())),
            Reply::Respond(ServerMessage::Alarms(vec![AlarmView {
                id: 0,
                time: "07:15:00".to_string()
            }]))
        );

        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(7, 15, 0)
            .unwrap();
        clock.scheduler(ManualClock::new(at)).tick().unwrap();

        assert_eq!(
            dispatch(&clock, ClientMessage::StopAlarm),
            Reply::Respond(ServerMessage::Stopped(0))
        );
        assert_eq!(
            dispatch(&clock, ClientMessage::StopAlarm),
            Reply::Respond(ServerMessage::NothingRinging)
        );
        assert_eq!(
            dispatch(&clock, ClientMessage::RemoveAlarm(0)),
            Reply::Respond(ServerMessage::Alarms(Vec::new()))
        );
    }

    #[test]
    fn errors_become_error_messages() {
        let clock = AlarmClock::new();
        let Reply::Respond(ServerMessage::Error { kind, .. }) =
            dispatch(&clock, ClientMessage::AddAlarm("25:00:00".to_string()))
        else {
            panic!("expected an error reply");
        };
        assert_eq!(kind, "InvalidTimeFormat");

        let Reply::Respond(ServerMessage::Error { kind, message }) =
            dispatch(&clock, ClientMessage::RemoveAlarm(1))
        else {
            panic!("expected an error reply");
        };
        assert_eq!(kind, "AlarmNotFound");
        assert_eq!(message, "alarm 1 not found");
    }

    #[test]
    fn subscribe_and_shutdown_are_left_to_the_connection() {
        let clock = AlarmClock::new();
        assert_eq!(dispatch(&clock, ClientMessage::Subscribe), Reply::Subscribe);
        assert_eq!(dispatch(&clock, ClientMessage::Shutdown), Reply::Shutdown);
        assert!(clock.list_alarms().is_empty());
    }

    #[test]
    fn streaming_unsubscribes_when_the_client_hangs_up() {
        let clock = AlarmClock::new();
        let (hung_up, hangup) = bounded::<()>(0);
        let streaming = {
            let clock = clock.clone();
            thread::spawn(move || {
                let mut out = Vec::new();
                stream_events(&clock, &mut out, &hangup).unwrap();
                out
            })
        };
        wait_for("the subscription", || clock.subscriber_count() == 1);

        drop(hung_up);
        assert!(streaming.join().unwrap().is_empty());
        assert_eq!(clock.subscriber_count(), 0);
    }

    #[test]
    fn watch_connection_is_released_after_disconnect() {
        let socket_name = format!("clock_alert-test-{}.sock", std::process::id());
        let listener = bind(&socket_name).unwrap();
        let clock = AlarmClock::new();
        let (shutdown, _shutdown_rx) = bounded(1);
        let server = Server::new(clock.clone(), shutdown);
        thread::spawn(move || server.run(&listener));

        let mut watcher = Client::connect(&socket_name).unwrap();
        assert_eq!(
            watcher.request(&ClientMessage::Subscribe).unwrap(),
            ServerMessage::Subscribed
        );
        wait_for("the subscription", || clock.subscriber_count() == 1);

        // nothing rings, so only the hangup can end the stream
        drop(watcher);
        wait_for("the unsubscribe", || clock.subscriber_count() == 0);
    }
}

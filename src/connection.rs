//! One persistent WebSocket to the practice backend.
//!
//! Each [`Connection`] owns a background thread that performs the handshake,
//! writes queued commands and forwards everything it reads to a crossbeam
//! channel, tagged with the connection's id. The receiving side compares the
//! id against its current connection so a superseded socket can never touch
//! fresh state.

use std::io;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::protocol::Command;

/// Path of the WebSocket endpoint on the backend.
pub const ENDPOINT_PATH: &str = "/ws";

/// How long a blocking read waits before the thread checks for outgoing
/// commands again.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long to wait for the server's close reply.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

pub type ConnectionId = u64;

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Message(String),
    Error(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionNotification {
    pub id: ConnectionId,
    pub event: ConnectionEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ReadyState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

struct Shared {
    state: AtomicU8,
    close_on_open: AtomicBool,
}

impl Shared {
    fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set(&self, state: ReadyState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

enum Outgoing {
    Text(String),
    Close,
}

/// Derive the WebSocket endpoint from a server origin: `https` becomes
/// `wss`, `http` becomes `ws`, and the path is always [`ENDPOINT_PATH`].
pub fn endpoint_url(origin: &str) -> anyhow::Result<String> {
    let (scheme, rest) = origin
        .trim()
        .split_once("://")
        .ok_or_else(|| anyhow::anyhow!("Server origin needs a scheme: {origin}"))?;
    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => anyhow::bail!("Unsupported scheme '{other}' in server origin {origin}"),
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        anyhow::bail!("Server origin has no host: {origin}");
    }
    Ok(format!("{ws_scheme}://{host}{ENDPOINT_PATH}"))
}

pub struct Connection {
    id: ConnectionId,
    shared: Arc<Shared>,
    outgoing: Sender<Outgoing>,
}

impl Connection {
    /// Start connecting to `url`. Lifecycle events and incoming frames are
    /// delivered on `events`.
    pub fn open(
        id: ConnectionId,
        url: &str,
        events: Sender<ConnectionNotification>,
    ) -> anyhow::Result<Self> {
        #[cfg(feature = "tls")]
        install_crypto_provider();

        let shared = Arc::new(Shared {
            state: AtomicU8::new(ReadyState::Connecting as u8),
            close_on_open: AtomicBool::new(false),
        });
        let (outgoing_tx, outgoing_rx) = crossbeam_channel::unbounded();

        let thread_shared = shared.clone();
        let thread_url = url.to_string();
        std::thread::Builder::new()
            .name(format!("ws-{id}"))
            .spawn(move || run(id, thread_url, thread_shared, outgoing_rx, events))?;
        log::info!("Connection {id}: connecting to {url}");

        Ok(Connection {
            id,
            shared,
            outgoing: outgoing_tx,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn ready_state(&self) -> ReadyState {
        self.shared.get()
    }

    /// Queue a command if the connection is open; otherwise drop it.
    pub fn send(&self, command: &Command) {
        if self.ready_state() != ReadyState::Open {
            log::debug!("Connection {}: not open, dropping {command:?}", self.id);
            return;
        }
        match command.encode() {
            Ok(text) => {
                if self.outgoing.send(Outgoing::Text(text)).is_err() {
                    log::debug!("Connection {}: writer gone, dropping {command:?}", self.id);
                }
            }
            Err(e) => log::warn!("Connection {}: failed to encode {command:?}: {e}", self.id),
        }
    }

    /// Tear the connection down. An open socket is closed right away; one
    /// that is still handshaking is closed as soon as the handshake ends.
    pub fn close(&self) {
        self.shared.close_on_open.store(true, Ordering::SeqCst);
        match self.ready_state() {
            ReadyState::Open => {
                self.shared.set(ReadyState::Closing);
                let _ = self.outgoing.send(Outgoing::Close);
            }
            ReadyState::Connecting => {
                log::debug!("Connection {}: close deferred until open", self.id);
            }
            ReadyState::Closing | ReadyState::Closed => {}
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// rustls refuses to build a client config until a process-wide crypto
/// provider is chosen.
#[cfg(feature = "tls")]
fn install_crypto_provider() {
    static INSTALL: std::sync::Once = std::sync::Once::new();
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            log::debug!("A rustls crypto provider was already installed");
        }
    });
}

fn run(
    id: ConnectionId,
    url: String,
    shared: Arc<Shared>,
    outgoing: Receiver<Outgoing>,
    events: Sender<ConnectionNotification>,
) {
    let notify = |event| {
        let _ = events.send(ConnectionNotification { id, event });
    };

    let mut socket = match tungstenite::connect(url.as_str()) {
        Ok((socket, _response)) => socket,
        Err(e) => {
            log::warn!("Connection {id}: failed to connect to {url}: {e}");
            shared.set(ReadyState::Closed);
            notify(ConnectionEvent::Error(e.to_string()));
            notify(ConnectionEvent::Closed);
            return;
        }
    };

    if let Err(e) = set_read_timeout(&socket, POLL_INTERVAL) {
        log::warn!("Connection {id}: failed to configure socket: {e}");
        shared.set(ReadyState::Closed);
        notify(ConnectionEvent::Error(e.to_string()));
        notify(ConnectionEvent::Closed);
        return;
    }

    shared.set(ReadyState::Open);
    let mut closing_since = None;
    if shared.close_on_open.load(Ordering::SeqCst) {
        log::debug!("Connection {id}: opened after teardown, closing");
        begin_close(id, &mut socket, &shared, &mut closing_since);
    } else {
        log::info!("Connection {id}: open");
        notify(ConnectionEvent::Opened);
    }

    loop {
        match closing_since {
            None => loop {
                match outgoing.try_recv() {
                    Ok(Outgoing::Text(text)) => {
                        log::debug!("Connection {id}: send {text}");
                        if let Err(e) = socket.send(Message::Text(text)) {
                            log::warn!("Connection {id}: send failed: {e}");
                        }
                    }
                    Ok(Outgoing::Close) | Err(TryRecvError::Disconnected) => {
                        begin_close(id, &mut socket, &shared, &mut closing_since);
                        break;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            },
            Some(since) if since.elapsed() > CLOSE_TIMEOUT => {
                log::debug!("Connection {id}: no close reply, dropping socket");
                break;
            }
            Some(_) => {}
        }

        match socket.read() {
            Ok(Message::Text(text)) => notify(ConnectionEvent::Message(text)),
            Ok(Message::Close(frame)) => {
                log::info!("Connection {id}: closed by server ({frame:?})");
                if closing_since.is_none() {
                    shared.set(ReadyState::Closing);
                    closing_since = Some(Instant::now());
                }
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => break,
            Err(e) => {
                log::warn!("Connection {id}: {e}");
                notify(ConnectionEvent::Error(e.to_string()));
                break;
            }
        }
    }

    shared.set(ReadyState::Closed);
    log::info!("Connection {id}: closed");
    notify(ConnectionEvent::Closed);
}

fn begin_close(
    id: ConnectionId,
    socket: &mut Socket,
    shared: &Shared,
    closing_since: &mut Option<Instant>,
) {
    shared.set(ReadyState::Closing);
    if let Err(e) = socket.close(None) {
        log::debug!("Connection {id}: close: {e}");
    }
    *closing_since = Some(Instant::now());
}

fn set_read_timeout(socket: &Socket, timeout: Duration) -> io::Result<()> {
    match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(timeout)),
        #[cfg(feature = "tls")]
        MaybeTlsStream::Rustls(stream) => stream.get_ref().set_read_timeout(Some(timeout)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    const WAIT: Duration = Duration::from_secs(5);

    fn local_server() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("ws://{}{ENDPOINT_PATH}", listener.local_addr().unwrap());
        (listener, url)
    }

    fn next(rx: &Receiver<ConnectionNotification>) -> ConnectionEvent {
        rx.recv_timeout(WAIT).unwrap().event
    }

    /// Read frames until the peer goes away, returning the text frames.
    fn read_until_closed(ws: &mut WebSocket<TcpStream>) -> Vec<String> {
        let mut texts = Vec::new();
        loop {
            match ws.read() {
                Ok(Message::Text(t)) => texts.push(t),
                Ok(_) => {}
                Err(_) => return texts,
            }
        }
    }

    #[test]
    fn endpoint_from_origin() {
        assert_eq!(endpoint_url("http://127.0.0.1:8765").unwrap(), "ws://127.0.0.1:8765/ws");
        assert_eq!(endpoint_url("https://practice.example/").unwrap(), "wss://practice.example/ws");
        assert_eq!(endpoint_url("HTTPS://host:443/app?x=1").unwrap(), "wss://host:443/ws");
        assert_eq!(endpoint_url("ws://host").unwrap(), "ws://host/ws");
    }

    #[test]
    fn endpoint_rejects_bad_origins() {
        assert!(endpoint_url("127.0.0.1:8765").is_err());
        assert!(endpoint_url("ftp://host").is_err());
        assert!(endpoint_url("http://").is_err());
    }

    #[test]
    fn open_message_send_close() {
        let (listener, url) = local_server();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = tungstenite::accept(stream).unwrap();
            ws.send(Message::Text(r#"{"type":"midi_devices","devices":["KB-1"]}"#.into()))
                .unwrap();
            read_until_closed(&mut ws)
        });

        let (tx, rx) = crossbeam_channel::unbounded();
        let conn = Connection::open(7, &url, tx).unwrap();
        assert_eq!(next(&rx), ConnectionEvent::Opened);
        assert_eq!(conn.ready_state(), ReadyState::Open);
        assert_eq!(
            next(&rx),
            ConnectionEvent::Message(r#"{"type":"midi_devices","devices":["KB-1"]}"#.into())
        );

        conn.send(&Command::MidiDeviceSelect {
            device_id: "KB-1".into(),
        });
        conn.close();
        assert_eq!(next(&rx), ConnectionEvent::Closed);
        assert_eq!(conn.ready_state(), ReadyState::Closed);

        let received = server.join().unwrap();
        assert_eq!(
            received,
            vec![r#"{"type":"midi_device_select","deviceId":"KB-1"}"#.to_string()]
        );
    }

    #[test]
    fn close_while_connecting_is_deferred() {
        let (listener, url) = local_server();
        let (go_tx, go_rx) = crossbeam_channel::bounded::<()>(1);
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            // Hold the handshake until the client has tried to close.
            go_rx.recv().unwrap();
            let mut ws = tungstenite::accept(stream).unwrap();
            let first = ws.read().unwrap();
            let rest = read_until_closed(&mut ws);
            (first.is_close(), rest)
        });

        let (tx, rx) = crossbeam_channel::unbounded();
        let conn = Connection::open(1, &url, tx).unwrap();
        assert_eq!(conn.ready_state(), ReadyState::Connecting);
        conn.send(&Command::NextLesson);
        conn.close();
        assert_eq!(conn.ready_state(), ReadyState::Connecting);
        go_tx.send(()).unwrap();

        assert_eq!(next(&rx), ConnectionEvent::Closed);
        let (first_was_close, rest) = server.join().unwrap();
        assert!(first_was_close);
        assert!(rest.is_empty());
    }

    #[test]
    fn server_close_is_reported() {
        let (listener, url) = local_server();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = tungstenite::accept(stream).unwrap();
            ws.close(None).unwrap();
            read_until_closed(&mut ws);
        });

        let (tx, rx) = crossbeam_channel::unbounded();
        let conn = Connection::open(3, &url, tx).unwrap();
        assert_eq!(next(&rx), ConnectionEvent::Opened);
        assert_eq!(next(&rx), ConnectionEvent::Closed);
        conn.send(&Command::NextLesson);
        server.join().unwrap();
    }

    #[test]
    fn refused_connection_reports_error_then_close() {
        let url = {
            let (listener, url) = local_server();
            drop(listener);
            url
        };
        let (tx, rx) = crossbeam_channel::unbounded();
        let conn = Connection::open(2, &url, tx).unwrap();
        assert!(matches!(next(&rx), ConnectionEvent::Error(_)));
        assert_eq!(next(&rx), ConnectionEvent::Closed);
        assert_eq!(conn.ready_state(), ReadyState::Closed);
    }

    #[cfg(feature = "tls")]
    #[test]
    fn failed_tls_handshake_reports_error_then_close() {
        let (listener, url) = local_server();
        let url = url.replacen("ws://", "wss://", 1);
        // Plain TCP peer that hangs up instead of answering the ClientHello.
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let (tx, rx) = crossbeam_channel::unbounded();
        let conn = Connection::open(9, &url, tx).unwrap();
        assert!(matches!(next(&rx), ConnectionEvent::Error(_)));
        assert_eq!(next(&rx), ConnectionEvent::Closed);
        assert_eq!(conn.ready_state(), ReadyState::Closed);
        server.join().unwrap();
    }
}

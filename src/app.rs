use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::connection::{Connection, ConnectionEvent, ConnectionId, ConnectionNotification};
use crate::protocol::ServerEvent;
use crate::prefs::Preferences;
use crate::store::{Action, AppState, ConnectionStatus, Effect};

/// Owns the state, the live connection and the preferences, and is the one
/// place where actions are applied. Connection threads only ever reach the
/// state through [`App::pump`] on the owning thread.
pub struct App {
    url: String,
    state: AppState,
    prefs: Preferences,
    connection: Option<Connection>,
    next_id: ConnectionId,
    events_tx: Sender<ConnectionNotification>,
    events_rx: Receiver<ConnectionNotification>,
}

impl App {
    pub fn new(url: String, prefs: Preferences) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        App {
            url,
            state: AppState::new(prefs.show_root_indicator()),
            prefs,
            connection: None,
            next_id: 1,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open a connection, tearing down any previous one first.
    pub fn connect(&mut self) -> anyhow::Result<()> {
        self.disconnect();
        let id = self.next_id;
        self.next_id += 1;
        self.connection = Some(Connection::open(id, &self.url, self.events_tx.clone())?);
        Ok(())
    }

    /// User-driven reconnect: a fresh state, as on a restart, and a new
    /// connection. Events still in flight from the old one are ignored.
    pub fn reconnect(&mut self) -> anyhow::Result<()> {
        log::info!("Reconnecting to {}", self.url);
        self.state = AppState::new(self.prefs.show_root_indicator());
        self.connect()
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
    }

    /// Apply one action and run its effects.
    pub fn dispatch(&mut self, action: Action) {
        for effect in self.state.apply(action) {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Send(command) => match &self.connection {
                Some(conn) => conn.send(&command),
                None => log::debug!("No connection, dropping {command:?}"),
            },
            Effect::PersistShowRootIndicator(show) => {
                if let Err(e) = self.prefs.set_show_root_indicator(show) {
                    log::warn!("Failed to save preferences: {e}");
                }
            }
        }
    }

    /// Handle one notification from a connection thread.
    pub fn handle_notification(&mut self, notification: ConnectionNotification) {
        let current = self.connection.as_ref().map(Connection::id);
        if current != Some(notification.id) {
            log::debug!(
                "Ignoring {:?} from stale connection {}",
                notification.event,
                notification.id
            );
            return;
        }
        let action = match notification.event {
            ConnectionEvent::Opened => Action::Connection(ConnectionStatus::Opened),
            ConnectionEvent::Error(e) => {
                log::warn!("Connection error: {e}");
                Action::Connection(ConnectionStatus::Errored)
            }
            ConnectionEvent::Closed => {
                self.connection = None;
                Action::Connection(ConnectionStatus::Closed)
            }
            ConnectionEvent::Message(text) => match ServerEvent::decode(&text) {
                Ok(event) => {
                    log::debug!("Received {}", event.kind());
                    Action::Server(event)
                }
                Err(e) => {
                    log::debug!("Dropping frame ({e}): {text}");
                    return;
                }
            },
        };
        self.dispatch(action);
    }

    /// Drain every pending notification. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(notification) = self.events_rx.try_recv() {
            self.handle_notification(notification);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for one notification, then drain the rest.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.events_rx.recv_timeout(timeout) {
            Ok(notification) => {
                self.handle_notification(notification);
                1 + self.pump()
            }
            Err(_) => 0,
        }
    }

    pub fn is_connection_live(&self) -> bool {
        self.connection.is_some()
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.disconnect();
    }
}

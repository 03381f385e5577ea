//! Connection status management.
//!
//! Multiple tasks want to read and move the connection state. Transitions go
//! through this guarded table: a task requests a move to a transitory state
//! (`connecting`, `disconnecting`) and receives a single-use completer that
//! finishes the move to a static state. Requests may be rejected, and
//! transitions in flight are observed through a completion channel that is
//! read under the lock and awaited outside of it.

use super::super::error::{Error, Result};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Connection status of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Disconnected,
    Disconnecting,
    Connecting,
    Reconnecting,
    Connected,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Disconnected => "disconnected",
            Status::Disconnecting => "disconnecting",
            Status::Connecting => "connecting",
            Status::Reconnecting => "reconnecting",
            Status::Connected => "connected",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct Inner {
    status: Status,
    will_reconnect: bool,
    action_completed: Option<watch::Sender<bool>>,
}

impl Inner {
    fn open_channel(&mut self) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        self.action_completed = Some(tx);
        rx
    }

    fn close_channel(&mut self) {
        if let Some(tx) = self.action_completed.take() {
            tx.send_replace(true);
        }
    }

    fn subscribe(&self) -> Option<watch::Receiver<bool>> {
        self.action_completed.as_ref().map(watch::Sender::subscribe)
    }
}

/// Guarded connection state shared between the client API and the IO side.
#[derive(Debug)]
pub struct ConnectionStatus {
    inner: Mutex<Inner>,
}

async fn wait_done(mut rx: watch::Receiver<bool>) {
    // a dropped sender also means the action finished
    let _ = rx.wait_for(|done| *done).await;
}

impl ConnectionStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(ConnectionStatus {
            inner: Mutex::new(Inner {
                status: Status::Disconnected,
                will_reconnect: false,
                action_completed: None,
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("status lock poisoned")
    }

    pub fn status(&self) -> Status {
        self.lock().status
    }

    pub fn status_retry(&self) -> (Status, bool) {
        let inner = self.lock();
        (inner.status, inner.will_reconnect)
    }

    /// Move `disconnected -> connecting`. The returned completer finishes the
    /// transition to `connected` or back to `disconnected`.
    pub fn connecting(self: &Arc<Self>) -> Result<ConnectCompleter> {
        let mut inner = self.lock();
        if inner.status == Status::Connected || inner.status == Status::Reconnecting {
            return Err(Error::AlreadyConnectedOrReconnecting);
        }
        if inner.status != Status::Disconnected {
            return Err(Error::StatusMustBeDisconnected);
        }
        inner.status = Status::Connecting;
        inner.open_channel();
        Ok(ConnectCompleter {
            status: Arc::clone(self),
        })
    }

    /// Move any non-disconnected state to `disconnecting`. Waits for an
    /// in-flight connect/reconnect to complete first; the returned completer
    /// finishes the move to `disconnected`.
    pub async fn disconnecting(self: &Arc<Self>) -> Result<DisconnectCompleter> {
        enum Step {
            AlreadyDisconnected,
            WasDisconnecting(Option<watch::Receiver<bool>>),
            Other(Status),
        }

        let step = {
            let mut inner = self.lock();
            match inner.status {
                Status::Disconnected => Step::AlreadyDisconnected,
                Status::Disconnecting => {
                    inner.will_reconnect = false;
                    Step::WasDisconnecting(inner.subscribe())
                }
                other => {
                    inner.status = Status::Disconnecting;
                    Step::Other(other)
                }
            }
        };

        let prev = match step {
            Step::AlreadyDisconnected => return Err(Error::AlreadyDisconnected),
            Step::WasDisconnecting(rx) => {
                if let Some(rx) = rx {
                    wait_done(rx).await;
                }
                return Err(Error::AlreadyDisconnected);
            }
            Step::Other(other) => other,
        };

        if prev == Status::Connecting || prev == Status::Reconnecting {
            let rx = {
                let inner = self.lock();
                inner.subscribe()
            };
            if let Some(rx) = rx {
                wait_done(rx).await;
            }
            let will_reconnect = {
                let inner = self.lock();
                inner.will_reconnect
            };
            // a lost reconnecting connection without a retry request ends up
            // disconnected after the completion runs
            if prev == Status::Reconnecting && !will_reconnect {
                return Err(Error::AlreadyDisconnected);
            }
        }

        let mut inner = self.lock();
        inner.open_channel();
        Ok(DisconnectCompleter {
            status: Arc::clone(self),
        })
    }

    /// Record a lost connection. With `will_reconnect` the eventual handler
    /// moves to `reconnecting`; otherwise to `disconnected`.
    pub async fn connection_lost(self: &Arc<Self>, will_reconnect: bool) -> Result<LostHandler> {
        let prev;
        {
            let mut inner = self.lock();
            match inner.status {
                Status::Disconnected => return Err(Error::AlreadyDisconnected),
                // expected while a disconnect is already tearing things down
                Status::Disconnecting => return Err(Error::DisconnectionInProgress),
                other => {
                    prev = other;
                    inner.will_reconnect = will_reconnect;
                    inner.status = Status::Disconnecting;
                }
            }
        }

        if prev == Status::Connecting || prev == Status::Reconnecting {
            let rx = {
                let inner = self.lock();
                inner.subscribe()
            };
            if let Some(rx) = rx {
                wait_done(rx).await;
            }
            if !will_reconnect {
                // the connect completion already aborted, nothing more to do
                return Err(Error::AlreadyDisconnected);
            }
        }

        let mut inner = self.lock();
        inner.open_channel();
        Ok(LostHandler {
            status: Arc::clone(self),
            reconnect_requested: will_reconnect,
        })
    }
}

/// Single-use completion of a connect/reconnect attempt.
#[derive(Debug)]
pub struct ConnectCompleter {
    status: Arc<ConnectionStatus>,
}

impl ConnectCompleter {
    /// Finish the attempt. Fails with `AbortConnection` when a disconnect
    /// arrived mid-flight; the disconnect flow then owns the state.
    pub fn complete(self, success: bool) -> Result<()> {
        let mut inner = self.status.lock();
        if inner.status == Status::Disconnecting {
            inner.close_channel();
            return Err(Error::AbortConnection);
        }
        inner.status = if success {
            Status::Connected
        } else {
            Status::Disconnected
        };
        inner.close_channel();
        Ok(())
    }
}

/// Single-use completion of a disconnect.
#[derive(Debug)]
pub struct DisconnectCompleter {
    status: Arc<ConnectionStatus>,
}

impl DisconnectCompleter {
    pub fn complete(self) {
        let mut inner = self.status.lock();
        inner.status = Status::Disconnected;
        inner.close_channel();
    }
}

/// Single-use handler for a recorded connection loss.
#[derive(Debug)]
pub struct LostHandler {
    status: Arc<ConnectionStatus>,
    reconnect_requested: bool,
}

impl LostHandler {
    /// Drive the loss to its follow-up state. Returns a fresh connect
    /// completer when the reconnect should proceed, `Ok(None)` when the state
    /// settled at `disconnected`, and `DisconnectionRequested` when a
    /// concurrent disconnect cancelled the reconnect.
    pub fn proceed(self, proceed: bool) -> Result<Option<ConnectCompleter>> {
        let mut inner = self.status.lock();
        if !inner.will_reconnect || !proceed {
            inner.status = Status::Disconnected;
            inner.close_channel();
            if !self.reconnect_requested || !proceed {
                return Ok(None);
            }
            return Err(Error::DisconnectionRequested);
        }
        inner.status = Status::Reconnecting;
        Ok(Some(ConnectCompleter {
            status: Arc::clone(&self.status),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_then_disconnect_ends_disconnected() {
        let status = ConnectionStatus::new();
        assert_eq!(status.status(), Status::Disconnected);

        let completer = status.connecting().unwrap();
        assert_eq!(status.status(), Status::Connecting);
        // a second connect while one is in flight is rejected
        assert!(matches!(
            status.connecting(),
            Err(Error::StatusMustBeDisconnected)
        ));
        completer.complete(true).unwrap();
        assert_eq!(status.status(), Status::Connected);

        let completer = status.disconnecting().await.unwrap();
        assert_eq!(status.status(), Status::Disconnecting);
        completer.complete();
        assert_eq!(status.status(), Status::Disconnected);
        assert!(matches!(
            status.disconnecting().await,
            Err(Error::AlreadyDisconnected)
        ));
    }

    #[tokio::test]
    async fn failed_connect_returns_to_disconnected() {
        let status = ConnectionStatus::new();
        let completer = status.connecting().unwrap();
        completer.complete(false).unwrap();
        assert_eq!(status.status(), Status::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_during_connect_aborts_the_attempt() {
        let status = ConnectionStatus::new();
        let completer = status.connecting().unwrap();

        let status2 = Arc::clone(&status);
        let disconnect = tokio::spawn(async move { status2.disconnecting().await });
        // give the disconnect a moment to move us to disconnecting and block
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(status.status(), Status::Disconnecting);

        assert!(matches!(completer.complete(true), Err(Error::AbortConnection)));
        let disconnect_completer = disconnect.await.unwrap().unwrap();
        disconnect_completer.complete();
        assert_eq!(status.status(), Status::Disconnected);
    }

    #[tokio::test]
    async fn connection_lost_with_reconnect_reaches_reconnecting_once() {
        let status = ConnectionStatus::new();
        status.connecting().unwrap().complete(true).unwrap();

        let handler = status.connection_lost(true).await.unwrap();
        assert_eq!(status.status(), Status::Disconnecting);
        let completer = handler.proceed(true).unwrap().expect("reconnect completer");
        assert_eq!(status.status(), Status::Reconnecting);
        // losing again while reconnect runs waits on its completion
        completer.complete(true).unwrap();
        assert_eq!(status.status(), Status::Connected);
    }

    #[tokio::test]
    async fn connection_lost_without_reconnect_settles_disconnected() {
        let status = ConnectionStatus::new();
        status.connecting().unwrap().complete(true).unwrap();

        let handler = status.connection_lost(false).await.unwrap();
        assert!(handler.proceed(true).unwrap().is_none());
        assert_eq!(status.status(), Status::Disconnected);
    }

    #[tokio::test]
    async fn concurrent_disconnect_cancels_pending_reconnect() {
        let status = ConnectionStatus::new();
        status.connecting().unwrap().complete(true).unwrap();

        let handler = status.connection_lost(true).await.unwrap();
        // a user disconnect arrives before the handler proceeds and clears
        // the reconnect request
        {
            let mut inner = status.inner.lock().unwrap();
            inner.will_reconnect = false;
        }
        assert!(matches!(
            handler.proceed(true),
            Err(Error::DisconnectionRequested)
        ));
        assert_eq!(status.status(), Status::Disconnected);
    }
}

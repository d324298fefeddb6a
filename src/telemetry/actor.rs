//! Session actor.
//!
//! Runs a [`TelemetrySession`] on its own tokio task and feeds it through an
//! unbounded command channel. However many producers hold a
//! [`SessionHandle`], fragments reach the session one at a time and in send
//! order, which is what keeps the decode buffer single-writer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::error::SessionError;
use super::session::{SessionEvent, TelemetrySession};
use crate::metrics::Snapshot;
use crate::patient::PatientSnapshot;

pub enum SessionCommand {
    Connect(oneshot::Sender<Result<Uuid, SessionError>>),
    Fragment {
        text: String,
        received_at: DateTime<Utc>,
    },
    Disconnect,
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Point-in-time view of a running session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    pub connected: bool,
    pub patients: Vec<PatientSnapshot>,
    pub metrics: Snapshot,
}

#[derive(Clone, Debug)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub async fn connect(&self) -> Result<Uuid, SessionError> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(SessionCommand::Connect(tx)).is_err() {
            return Err(SessionError::NotConnected);
        }
        rx.await.unwrap_or(Err(SessionError::NotConnected))
    }

    /// Queue a fragment stamped with the current time. Returns `false` once
    /// the session task has stopped.
    pub fn send_fragment(&self, text: impl Into<String>) -> bool {
        self.send_fragment_at(text, Utc::now())
    }

    pub fn send_fragment_at(&self, text: impl Into<String>, received_at: DateTime<Utc>) -> bool {
        self.tx
            .send(SessionCommand::Fragment {
                text: text.into(),
                received_at,
            })
            .is_ok()
    }

    pub fn disconnect(&self) {
        let _ = self.tx.send(SessionCommand::Disconnect);
    }

    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(SessionCommand::Snapshot(tx)).is_ok() {
            rx.await.ok()
        } else {
            None
        }
    }

    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(SessionCommand::Shutdown(tx));
        let _ = rx.await;
    }
}

/// Spawn the session task. Every [`SessionEvent`] is forwarded to `events`;
/// a closed receiver is not an error, the events are simply dropped.
pub fn start_session(
    mut session: TelemetrySession,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> SessionHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<SessionCommand>();
    let handle = SessionHandle { tx };

    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                SessionCommand::Connect(resp) => {
                    let _ = resp.send(session.connect());
                }
                SessionCommand::Fragment { text, received_at } => {
                    match session.on_fragment(&text, received_at) {
                        Ok(produced) => {
                            for event in produced {
                                let _ = events.send(event);
                            }
                        }
                        Err(e) => log::warn!("dropping {} char fragment: {}", text.len(), e),
                    }
                }
                SessionCommand::Disconnect => session.disconnect(),
                SessionCommand::Snapshot(resp) => {
                    let _ = resp.send(SessionSnapshot {
                        session_id: session.session_id(),
                        connected: session.is_connected(),
                        patients: session.patients(),
                        metrics: session.metrics(),
                    });
                }
                SessionCommand::Shutdown(done) => {
                    session.disconnect();
                    let _ = done.send(());
                    break;
                }
            }
        }
        log::debug!("session loop terminated");
    });

    handle
}

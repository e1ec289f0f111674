use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::entities::{UserId, WorkspaceId};
use crate::domain::events::FanoutEvent;
use crate::domain::ports::fanout::FanoutPublisher;
use crate::infrastructure::realtime::frames::ServerFrame;

pub type SessionId = Uuid;

/// The hub's side of a live session.
struct SessionEntry {
    user_id: UserId,
    outbox: mpsc::Sender<ServerFrame>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct WorkspaceBag {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
}

/// The connection's side of a live session, returned by [`SessionHub::open`].
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub outbox: mpsc::Receiver<ServerFrame>,
    /// Fires when the hub drops the session or the connection ends.
    pub cancel: CancellationToken,
}

/// Process-wide registry of live agent sessions, bagged per workspace.
#[derive(Clone)]
pub struct SessionHub {
    inner: Arc<SessionHubInner>,
}

struct SessionHubInner {
    workspaces: RwLock<HashMap<WorkspaceId, Arc<WorkspaceBag>>>,
    outbox_capacity: usize,
}

impl SessionHub {
    pub fn new(outbox_capacity: usize) -> Self {
        Self {
            inner: Arc::new(SessionHubInner {
                workspaces: RwLock::new(HashMap::new()),
                outbox_capacity: outbox_capacity.max(1),
            }),
        }
    }

    /// Registers a session. Membership must already have been checked.
    pub fn open(&self, workspace_id: &str, user_id: &str) -> Session {
        let (outbox_tx, outbox_rx) = mpsc::channel(self.inner.outbox_capacity);
        let cancel = CancellationToken::new();
        let id = Uuid::new_v4();

        {
            let mut workspaces = self
                .inner
                .workspaces
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let bag = workspaces.entry(workspace_id.to_string()).or_default();
            bag.sessions
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(
                    id,
                    SessionEntry {
                        user_id: user_id.to_string(),
                        outbox: outbox_tx,
                        cancel: cancel.clone(),
                    },
                );
        }

        self.record_active();
        info!(
            "Session {} opened for user {} in workspace {}",
            id, user_id, workspace_id
        );

        Session {
            id,
            workspace_id: workspace_id.to_string(),
            user_id: user_id.to_string(),
            outbox: outbox_rx,
            cancel,
        }
    }

    /// Removes the session and cancels it. Safe to call more than once.
    pub fn close(&self, workspace_id: &str, session_id: SessionId) -> bool {
        let removed = {
            let mut workspaces = self
                .inner
                .workspaces
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(bag) = workspaces.get(workspace_id).cloned() else {
                return false;
            };
            let mut sessions = bag.sessions.write().unwrap_or_else(PoisonError::into_inner);
            let removed = sessions.remove(&session_id);
            if sessions.is_empty() {
                drop(sessions);
                workspaces.remove(workspace_id);
            }
            removed
        };

        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                self.record_active();
                info!(
                    "Session {} of user {} closed in workspace {}",
                    session_id, entry.user_id, workspace_id
                );
                true
            }
            None => false,
        }
    }

    /// Queues `frame` for every session of the workspace without waiting on any of them.
    /// Sessions whose outbox is full or gone are dropped. Returns how many accepted it.
    pub fn broadcast(&self, workspace_id: &str, frame: &ServerFrame) -> usize {
        let Some(bag) = self.bag(workspace_id) else {
            return 0;
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        {
            let sessions = bag.sessions.read().unwrap_or_else(PoisonError::into_inner);
            for (id, entry) in sessions.iter() {
                match entry.outbox.try_send(frame.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(
                            "Session {} of user {} is not keeping up, dropping it",
                            id, entry.user_id
                        );
                        failed.push(*id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("Session {} outbox already closed", id);
                        failed.push(*id);
                    }
                }
            }
        }

        for id in failed {
            if self.close(workspace_id, id) {
                metrics::counter!("relaydesk_fanout_sessions_dropped_total").increment(1);
            }
        }

        delivered
    }

    /// Queues a frame for one session only.
    pub fn send_to_session(
        &self,
        workspace_id: &str,
        session_id: SessionId,
        frame: ServerFrame,
    ) -> bool {
        let Some(bag) = self.bag(workspace_id) else {
            return false;
        };
        let sessions = bag.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(&session_id)
            .map(|entry| entry.outbox.try_send(frame).is_ok())
            .unwrap_or(false)
    }

    pub fn session_count(&self, workspace_id: &str) -> usize {
        self.bag(workspace_id)
            .map(|bag| {
                bag.sessions
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .len()
            })
            .unwrap_or(0)
    }

    pub fn total_sessions(&self) -> usize {
        self.inner
            .workspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|bag| {
                bag.sessions
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .len()
            })
            .sum()
    }

    fn bag(&self, workspace_id: &str) -> Option<Arc<WorkspaceBag>> {
        self.inner
            .workspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(workspace_id)
            .cloned()
    }

    fn record_active(&self) {
        metrics::gauge!("relaydesk_sessions_active").set(self.total_sessions() as f64);
    }
}

impl FanoutPublisher for SessionHub {
    fn publish(&self, event: FanoutEvent) {
        let frame = ServerFrame::from(&event);
        let delivered = self.broadcast(event.workspace_id(), &frame);
        debug!(
            "Fan-out {} for ticket {} reached {} session(s)",
            event.kind(),
            event.ticket_id(),
            delivered
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{InboundMessage, MessageBody};

    fn frame(n: i64) -> ServerFrame {
        ServerFrame::from(&FanoutEvent::Inbound {
            workspace_id: "WS1".into(),
            chat_id: "9001".into(),
            message: InboundMessage {
                id: format!("m{}", n),
                ticket_id: "T1".into(),
                seq: n,
                body: MessageBody::text(format!("message {}", n)),
                external_message_id: n.to_string(),
                created_at: "2026-01-01T00:00:00.000000Z".into(),
            },
        })
    }

    #[tokio::test]
    async fn test_broadcast_reaches_only_the_workspace() {
        let hub = SessionHub::new(8);
        let mut a = hub.open("WS1", "U1");
        let mut b = hub.open("WS1", "U2");
        let mut other = hub.open("WS2", "U3");

        assert_eq!(hub.broadcast("WS1", &frame(1)), 2);

        assert_eq!(a.outbox.recv().await.unwrap().seq, Some(1));
        assert_eq!(b.outbox.recv().await.unwrap().seq, Some(1));
        assert!(other.outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_frames_arrive_in_publish_order() {
        let hub = SessionHub::new(16);
        let mut session = hub.open("WS1", "U1");

        for n in 1..=10 {
            hub.broadcast("WS1", &frame(n));
        }

        for n in 1..=10 {
            assert_eq!(session.outbox.recv().await.unwrap().seq, Some(n));
        }
    }

    #[tokio::test]
    async fn test_slow_session_is_dropped_without_blocking_others() {
        let hub = SessionHub::new(1);
        let slow = hub.open("WS1", "slow");
        let mut fast = hub.open("WS1", "fast");

        assert_eq!(hub.broadcast("WS1", &frame(1)), 2);
        assert_eq!(fast.outbox.recv().await.unwrap().seq, Some(1));

        // `slow` never drains, so its single slot is still taken.
        assert_eq!(hub.broadcast("WS1", &frame(2)), 1);
        assert!(slow.cancel.is_cancelled());
        assert_eq!(hub.session_count("WS1"), 1);
        assert_eq!(fast.outbox.recv().await.unwrap().seq, Some(2));
    }

    #[tokio::test]
    async fn test_closed_receiver_is_removed() {
        let hub = SessionHub::new(4);
        let gone = hub.open("WS1", "U1");
        let gone_id = gone.id;
        drop(gone);

        assert_eq!(hub.broadcast("WS1", &frame(1)), 0);
        assert!(!hub.close("WS1", gone_id));
        assert_eq!(hub.total_sessions(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let hub = SessionHub::new(4);
        let session = hub.open("WS1", "U1");

        assert!(hub.close("WS1", session.id));
        assert!(session.cancel.is_cancelled());
        assert!(!hub.close("WS1", session.id));
        assert!(!hub.close("WS-unknown", session.id));
        assert_eq!(hub.session_count("WS1"), 0);
    }

    #[tokio::test]
    async fn test_send_to_session_targets_one_peer() {
        let hub = SessionHub::new(4);
        let mut a = hub.open("WS1", "U1");
        let mut b = hub.open("WS1", "U2");

        assert!(hub.send_to_session("WS1", a.id, ServerFrame::error("T1", "9001", "denied")));

        assert_eq!(a.outbox.recv().await.unwrap().message, "denied");
        assert!(b.outbox.try_recv().is_err());
    }
}

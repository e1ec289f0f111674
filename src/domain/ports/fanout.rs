use crate::domain::events::FanoutEvent;

/// Non-blocking handoff of ticket events to live sessions.
///
/// Implementations must not await slow peers: a publish returns once the event is queued
/// (or dropped) for every session, so inbound ingestion never waits on a session.
pub trait FanoutPublisher: Send + Sync {
    fn publish(&self, event: FanoutEvent);
}

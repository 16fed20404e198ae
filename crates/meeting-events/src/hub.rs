use dashmap::DashMap;
use meeting_core::MeetingId;
use tokio::sync::broadcast;
use tracing::debug;

use crate::event::MeetingEvent;

/// Per-meeting fan-out of [`MeetingEvent`]s: one `broadcast::Sender` per
/// meeting id rather than a single global channel, so a slow subscriber on
/// one meeting cannot affect another's delivery.
pub struct EventHub {
    channels: DashMap<MeetingId, broadcast::Sender<MeetingEvent>>,
    capacity: usize,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_capacity(meeting_core::limits::BROADCAST_CAPACITY)
    }

    /// Build a hub whose per-meeting channels hold `capacity` events before
    /// a slow subscriber is declared lagged.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { channels: DashMap::new(), capacity }
    }

    fn sender(&self, meeting_id: &MeetingId) -> broadcast::Sender<MeetingEvent> {
        self.channels
            .entry(meeting_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish an event to every current subscriber of `meeting_id`.
    /// Silently drops if nobody is subscribed.
    pub fn publish(&self, meeting_id: &MeetingId, event: MeetingEvent) {
        let tx = self.sender(meeting_id);
        if tx.send(event).is_err() {
            debug!(%meeting_id, "no subscribers for meeting event");
        }
    }

    /// Subscribe to `meeting_id`'s event stream. Only events produced after
    /// this call are observed.
    pub fn subscribe(&self, meeting_id: &MeetingId) -> EventStream {
        EventStream {
            meeting_id: meeting_id.clone(),
            rx: self.sender(meeting_id).subscribe(),
            done: false,
        }
    }

    /// Drop a meeting's channel once the meeting is deleted, so subscriber
    /// lookups for that id start a fresh channel rather than reusing a
    /// stale one.
    pub fn remove(&self, meeting_id: &MeetingId) {
        self.channels.remove(meeting_id);
    }
}

/// A single subscriber's view of a meeting's events. Wraps
/// `broadcast::Receiver` so `Lagged` becomes one final
/// [`MeetingEvent::Lagged`] rather than an error the caller must handle
/// separately.
pub struct EventStream {
    meeting_id: MeetingId,
    rx: broadcast::Receiver<MeetingEvent>,
    done: bool,
}

impl EventStream {
    /// Await the next event. Returns `None` once the stream has terminated
    /// (after emitting `Lagged`, or when the hub's sender is dropped).
    pub async fn next(&mut self) -> Option<MeetingEvent> {
        if self.done {
            return None;
        }
        match self.rx.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                self.done = true;
                Some(MeetingEvent::Lagged { meeting_id: self.meeting_id, skipped })
            }
            Err(broadcast::error::RecvError::Closed) => {
                self.done = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use meeting_core::AgentId;

    use super::*;

    #[tokio::test]
    async fn publishes_to_subscriber() {
        let hub = EventHub::new();
        let meeting_id = MeetingId::new();
        let mut stream = hub.subscribe(&meeting_id);

        hub.publish(&meeting_id, MeetingEvent::NewMessage { message_id: Default::default() });

        let event = stream.next().await.unwrap();
        assert!(matches!(event, MeetingEvent::NewMessage { .. }));
    }

    #[tokio::test]
    async fn isolates_subscribers_across_meetings() {
        let hub = EventHub::new();
        let meeting_a = MeetingId::new();
        let meeting_b = MeetingId::new();
        let mut stream_b = hub.subscribe(&meeting_b);

        hub.publish(
            &meeting_a,
            MeetingEvent::TurnFailed { speaker_id: AgentId::new(), classification: "network".into() },
        );

        let result = tokio::time::timeout(std::time::Duration::from_millis(20), stream_b.next()).await;
        assert!(result.is_err(), "subscriber on meeting_b must not see meeting_a's events");
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let hub = EventHub::new();
        let meeting_id = MeetingId::new();

        hub.publish(&meeting_id, MeetingEvent::NewMessage { message_id: Default::default() });

        let mut stream = hub.subscribe(&meeting_id);
        hub.publish(&meeting_id, MeetingEvent::MindMapGenerated { version: Default::default() });

        let event = stream.next().await.unwrap();
        assert!(matches!(event, MeetingEvent::MindMapGenerated { .. }));
    }

    #[tokio::test]
    async fn lagged_subscriber_gets_terminal_event() {
        let hub = EventHub::new();
        let meeting_id = MeetingId::new();
        let mut stream = hub.subscribe(&meeting_id);

        for _ in 0..(meeting_core::limits::BROADCAST_CAPACITY + 10) {
            hub.publish(&meeting_id, MeetingEvent::NewMessage { message_id: Default::default() });
        }

        let mut saw_lagged = false;
        while let Some(event) = stream.next().await {
            if matches!(event, MeetingEvent::Lagged { .. }) {
                saw_lagged = true;
                break;
            }
        }
        assert!(saw_lagged);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn with_capacity_lags_at_the_configured_size_not_the_default() {
        let hub = EventHub::with_capacity(4);
        let meeting_id = MeetingId::new();
        let mut stream = hub.subscribe(&meeting_id);

        for _ in 0..10 {
            hub.publish(&meeting_id, MeetingEvent::NewMessage { message_id: Default::default() });
        }

        let mut saw_lagged = false;
        while let Some(event) = stream.next().await {
            if matches!(event, MeetingEvent::Lagged { .. }) {
                saw_lagged = true;
                break;
            }
        }
        assert!(saw_lagged);
    }

    #[tokio::test]
    async fn events_preserve_producer_order() {
        let hub = EventHub::new();
        let meeting_id = MeetingId::new();
        let mut stream = hub.subscribe(&meeting_id);

        hub.publish(&meeting_id, MeetingEvent::StatusChange { status: meeting_core::MeetingStatus::Paused });
        hub.publish(&meeting_id, MeetingEvent::StatusChange { status: meeting_core::MeetingStatus::Active });
        hub.publish(&meeting_id, MeetingEvent::StatusChange { status: meeting_core::MeetingStatus::Ended });

        let mut seen = Vec::new();
        for _ in 0..3 {
            if let Some(MeetingEvent::StatusChange { status }) = stream.next().await {
                seen.push(status);
            }
        }
        assert_eq!(
            seen,
            vec![
                meeting_core::MeetingStatus::Paused,
                meeting_core::MeetingStatus::Active,
                meeting_core::MeetingStatus::Ended,
            ]
        );
    }
}

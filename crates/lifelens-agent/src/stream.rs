//! Client event streams with exactly one terminal event.

use std::pin::Pin;

use futures::{Stream, StreamExt};

use lifelens_core::events::STREAM_ENDED_MESSAGE;
use lifelens_core::StreamEvent;

/// Events for one answered message, ending in `done` or `error`.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Wrap `events` so it ends right after its first terminal event, and gains
/// an `error` terminal if the source ends without one.
pub fn seal<S>(events: S) -> EventStream
where
    S: Stream<Item = StreamEvent> + Send + 'static,
{
    let sealed = futures::stream::unfold(Some(Box::pin(events)), |state| async move {
        let mut inner = state?;
        match inner.next().await {
            Some(event) if event.is_terminal() => Some((event, None)),
            Some(event) => Some((event, Some(inner))),
            None => Some((StreamEvent::error(STREAM_ENDED_MESSAGE), None)),
        }
    });
    Box::pin(sealed)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(events: Vec<StreamEvent>) -> Vec<StreamEvent> {
        seal(futures::stream::iter(events)).collect().await
    }

    #[tokio::test]
    async fn test_events_after_terminal_dropped() {
        let out = collect(vec![
            StreamEvent::text("a"),
            StreamEvent::Done { message_id: 7 },
            StreamEvent::text("late"),
            StreamEvent::error("late"),
        ])
        .await;
        assert_eq!(
            out,
            vec![StreamEvent::text("a"), StreamEvent::Done { message_id: 7 }]
        );
    }

    #[tokio::test]
    async fn test_missing_terminal_appended() {
        let out = collect(vec![StreamEvent::text("partial")]).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], StreamEvent::error(STREAM_ENDED_MESSAGE));
    }

    #[tokio::test]
    async fn test_empty_source() {
        let out = collect(Vec::new()).await;
        assert_eq!(out, vec![StreamEvent::error(STREAM_ENDED_MESSAGE)]);
    }
}

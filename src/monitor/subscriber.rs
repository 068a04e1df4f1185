//! Subscriber loops for the two admin stream kinds.
//!
//! Each loop owns one [`Listener`] and forwards records into a downstream
//! channel (the gRPC response stream). Loops end cleanly when the registry
//! signals stop, and with a [`TransportError`] when the downstream side has
//! gone away; neither affects other listeners.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{GatekeepError, GatekeepResult, TransportError};
use crate::event::{Event, StatWindow};

use super::registry::Listener;

/// Longest accepted statistics interval, in seconds (one day).
pub const MAX_STAT_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Validate a statistics interval given in whole seconds.
///
/// Accepts `1..=MAX_STAT_INTERVAL_SECS`.
pub fn stat_period(interval_seconds: u64) -> GatekeepResult<Duration> {
    if interval_seconds == 0 {
        return Err(GatekeepError::invalid_argument(
            "interval_seconds must be at least 1",
        ));
    }
    if interval_seconds > MAX_STAT_INTERVAL_SECS {
        return Err(GatekeepError::invalid_argument(format!(
            "interval_seconds must be at most {MAX_STAT_INTERVAL_SECS}"
        )));
    }
    Ok(Duration::from_secs(interval_seconds))
}

/// Forward `item` downstream unless the control signal fires first.
///
/// Returns `Ok(false)` when the loop should stop because of the control signal.
async fn forward<U>(
    control: &CancellationToken,
    out: &mpsc::Sender<U>,
    item: U,
    stream: &'static str,
) -> Result<bool, TransportError> {
    tokio::select! {
        biased;
        () = control.cancelled() => Ok(false),
        sent = out.send(item) => sent.map(|()| true).map_err(|_| TransportError::StreamClosed {
            stream: stream.to_string(),
        }),
    }
}

/// Re-emit every event received by `listener`.
pub async fn run_log_subscriber<U, F>(
    mut listener: Listener,
    out: mpsc::Sender<U>,
    map: F,
) -> Result<(), TransportError>
where
    F: Fn(Event) -> U,
{
    while let Some(event) = listener.recv().await {
        if !forward(listener.control(), &out, map(event), "logging").await? {
            break;
        }
    }
    debug!(listener = %listener.id(), "log subscriber finished");
    Ok(())
}

/// Fold events into a [`StatWindow`] and emit it every `period`.
///
/// Whichever of a tick and a pending event is polled first wins; every event
/// is counted in exactly one window either way. `period` is clamped to
/// [`MAX_STAT_INTERVAL_SECS`].
pub async fn run_stat_subscriber<U, F>(
    mut listener: Listener,
    period: Duration,
    out: mpsc::Sender<U>,
    map: F,
) -> Result<(), TransportError>
where
    F: Fn(StatWindow) -> U,
{
    let period = period.clamp(
        Duration::from_millis(1),
        Duration::from_secs(MAX_STAT_INTERVAL_SECS),
    );
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut window = StatWindow::new();

    loop {
        tokio::select! {
            event = listener.recv() => match event {
                Some(event) => window.record(&event),
                None => break,
            },
            _ = ticker.tick() => {
                let closed = window.rotate();
                if !forward(listener.control(), &out, map(closed), "statistics").await? {
                    break;
                }
            }
        }
    }
    debug!(listener = %listener.id(), "statistics subscriber finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::monitor::ListenerRegistry;

    fn ev(consumer: &str, method: &str) -> Event {
        Event::now(consumer, method, "10.0.0.1:4000")
    }

    #[test]
    fn interval_bounds() {
        assert!(stat_period(0).is_err());
        assert_eq!(stat_period(3).unwrap(), Duration::from_secs(3));
        assert_eq!(
            stat_period(MAX_STAT_INTERVAL_SECS).unwrap(),
            Duration::from_secs(MAX_STAT_INTERVAL_SECS)
        );

        let err = stat_period(MAX_STAT_INTERVAL_SECS + 1).unwrap_err();
        assert!(matches!(err, GatekeepError::InvalidArgument { .. }));
        let err = stat_period(u64::MAX).unwrap_err();
        assert!(matches!(err, GatekeepError::InvalidArgument { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_period_does_not_panic() {
        let registry = Arc::new(ListenerRegistry::new());
        let listener = registry.register().await;
        let (tx, mut rx) = mpsc::channel::<StatWindow>(1);
        let task = tokio::spawn(run_stat_subscriber(
            listener,
            Duration::from_secs(u64::MAX),
            tx,
            |w| w,
        ));

        registry.broadcast(&ev("x", "A")).await;
        tokio::task::yield_now().await;
        registry.stop().await;

        let joined = task.await;
        assert!(!joined.as_ref().is_err_and(tokio::task::JoinError::is_panic));
        joined.unwrap().unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn log_subscriber_forwards_in_order() {
        let registry = Arc::new(ListenerRegistry::new());
        let listener = registry.register().await;
        let (tx, mut rx) = mpsc::channel(1);
        let task = tokio::spawn(run_log_subscriber(listener, tx, |e| e));

        for method in ["a", "b", "c"] {
            registry.broadcast(&ev("bob", method)).await;
        }
        for method in ["a", "b", "c"] {
            assert_eq!(rx.recv().await.unwrap().method, method);
        }

        registry.stop().await;
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn log_subscriber_reports_closed_downstream() {
        let registry = ListenerRegistry::new();
        let listener = registry.register().await;
        let (tx, rx) = mpsc::channel::<Event>(1);
        drop(rx);
        let task = tokio::spawn(run_log_subscriber(listener, tx, |e| e));

        registry.broadcast(&ev("bob", "a")).await;
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, TransportError::StreamClosed { .. }));

        // The dead listener is pruned on the next pass.
        registry.broadcast(&ev("bob", "b")).await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn stat_windows_partition_events() {
        let registry = Arc::new(ListenerRegistry::new());
        let listener = registry.register().await;
        let (tx, mut rx) = mpsc::channel(4);
        let task = tokio::spawn(run_stat_subscriber(
            listener,
            Duration::from_secs(1),
            tx,
            |w| w,
        ));

        registry.broadcast(&ev("x", "A")).await;
        registry.broadcast(&ev("x", "A")).await;
        registry.broadcast(&ev("y", "B")).await;

        // Sum windows until all three events are accounted for.
        let mut total = StatWindow::new();
        while total.by_method.values().sum::<u64>() < 3 {
            let window = rx.recv().await.unwrap();
            assert!(window.timestamp > 0);
            for (k, v) in window.by_method {
                *total.by_method.entry(k).or_insert(0) += v;
            }
            for (k, v) in window.by_consumer {
                *total.by_consumer.entry(k).or_insert(0) += v;
            }
        }
        assert_eq!(total.by_method.get("A"), Some(&2));
        assert_eq!(total.by_method.get("B"), Some(&1));
        assert_eq!(total.by_consumer.get("x"), Some(&2));
        assert_eq!(total.by_consumer.get("y"), Some(&1));

        // No further events: the next window starts from zero.
        let next = rx.recv().await.unwrap();
        assert!(next.is_empty());
        assert!(next.by_consumer.is_empty());

        registry.stop().await;
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stat_subscriber_stops_on_signal() {
        let registry = ListenerRegistry::new();
        let listener = registry.register().await;
        let (tx, mut rx) = mpsc::channel::<StatWindow>(1);
        let task = tokio::spawn(run_stat_subscriber(
            listener,
            Duration::from_secs(60),
            tx,
            |w| w,
        ));

        registry.stop().await;
        task.await.unwrap().unwrap();
        assert!(rx.recv().await.is_none());
    }
}

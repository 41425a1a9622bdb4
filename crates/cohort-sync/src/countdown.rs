use crate::gate::{remaining_until, Clock, Remaining};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;

/// Shortest refresh interval a countdown ticks at.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Time remaining until `ends_at`, recomputed from `clock` every `every`.
///
/// The first value is yielded immediately. The stream ends after yielding
/// [`Remaining::Ended`]. Intervals shorter than [`MIN_INTERVAL`] are raised
/// to it. Must be called from within a Tokio runtime.
pub fn countdown(
    clock: Arc<dyn Clock>,
    ends_at: DateTime<Utc>,
    every: Duration,
) -> impl Stream<Item = Remaining> + Send + 'static {
    let ticks = IntervalStream::new(tokio::time::interval(every.max(MIN_INTERVAL)));
    stream::unfold((ticks, false), move |(mut ticks, ended)| {
        let clock = clock.clone();
        async move {
            if ended {
                return None;
            }
            ticks.next().await?;
            let left = remaining_until(ends_at, clock.now());
            Some((left, (ticks, left == Remaining::Ended)))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::ManualClock;
    use chrono::TimeZone;

    #[tokio::test(start_paused = true)]
    async fn ticks_until_ended() {
        let start = Utc.with_ymd_and_hms(2024, 1, 9, 23, 0, 0).unwrap();
        let ends_at = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));

        let mut stream = Box::pin(countdown(clock.clone(), ends_at, Duration::from_secs(60)));
        assert_eq!(stream.next().await.unwrap().to_string(), "1h 0m");

        clock.advance(chrono::Duration::minutes(30));
        assert_eq!(stream.next().await.unwrap().to_string(), "30m");

        clock.set(ends_at + chrono::Duration::seconds(1));
        assert_eq!(stream.next().await, Some(Remaining::Ended));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped() {
        let ends_at = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(ends_at - chrono::Duration::minutes(5)));

        let mut stream = Box::pin(countdown(clock.clone(), ends_at, Duration::ZERO));
        assert_eq!(stream.next().await.unwrap().to_string(), "5m");
        assert_eq!(stream.next().await.unwrap().to_string(), "5m");

        clock.set(ends_at + chrono::Duration::seconds(1));
        assert_eq!(stream.next().await, Some(Remaining::Ended));
    }
}

//! Recorded fixes played back at a fixed pace

use super::{FixFeed, PositionSource, RawFix, FEED_BUFFER};
use crate::error::{Result, TrackingError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// One entry of a replay file; `captured_at` defaults to the playback time
#[derive(Debug, Clone, Deserialize)]
struct ReplayFix {
    latitude: f64,
    longitude: f64,
    #[serde(default = "default_accuracy")]
    accuracy_m: f64,
    #[serde(default)]
    captured_at: Option<DateTime<Utc>>,
}

fn default_accuracy() -> f64 {
    5.0
}

/// Plays a JSON array of fixes, one every `pace`, then closes the feed
#[derive(Debug, Clone)]
pub struct ReplaySource {
    fixes: Vec<ReplayFix>,
    pace: Duration,
}

impl ReplaySource {
    /// Load `[{"latitude": .., "longitude": .., "accuracy_m": .., "captured_at": ..}, ..]`
    pub fn from_path(path: &Path, pace: Duration) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text, pace)
    }

    /// Parse a replay document
    pub fn from_json(json: &str, pace: Duration) -> Result<Self> {
        let fixes = serde_json::from_str(json)
            .map_err(|e| TrackingError::LocationUnavailable(format!("unreadable replay file: {e}")))?;
        Ok(Self { fixes, pace })
    }

    /// Number of recorded fixes
    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    /// Whether the recording is empty
    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

impl PositionSource for ReplaySource {
    fn open(&self) -> FixFeed {
        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let fixes = self.fixes.clone();
        let pace = self.pace;

        tokio::spawn(async move {
            for (index, fix) in fixes.into_iter().enumerate() {
                if index > 0 {
                    tokio::time::sleep(pace).await;
                }
                let raw = RawFix {
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                    accuracy_m: fix.accuracy_m,
                    captured_at: fix.captured_at.unwrap_or_else(Utc::now),
                };
                if tx.send(Ok(raw)).await.is_err() {
                    debug!(index, "Replay feed dropped by subscriber");
                    return;
                }
            }
            debug!("Replay finished");
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationProvider;
    use std::sync::Arc;

    const TRACK: &str = r#"[
        {"latitude": 37.000, "longitude": -122.000, "accuracy_m": 8, "captured_at": "2024-05-01T12:00:00Z"},
        {"latitude": 37.005, "longitude": -122.005, "captured_at": "2024-05-01T12:01:00Z"},
        {"latitude": 37.010, "longitude": -122.010, "accuracy_m": 4, "captured_at": "2024-05-01T12:02:00Z"}
    ]"#;

    #[test]
    fn test_parse() {
        let source = ReplaySource::from_json(TRACK, Duration::ZERO).unwrap();
        assert_eq!(source.len(), 3);
        assert!((source.fixes[1].accuracy_m - 5.0).abs() < f64::EPSILON);
        assert!(ReplaySource::from_json("{}", Duration::ZERO).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_through_provider() {
        let source = Arc::new(ReplaySource::from_json(TRACK, Duration::from_secs(1)).unwrap());
        let provider = LocationProvider::new(source, 100.0);
        let mut subscription = provider.subscribe(Duration::from_secs(5), 10.0);

        let mut samples = Vec::new();
        let end = loop {
            match subscription.next().await {
                Some(Ok(sample)) => samples.push(sample),
                other => break other,
            }
        };

        assert_eq!(samples.len(), 3);
        assert!(samples.windows(2).all(|w| w[0].captured_at < w[1].captured_at));
        assert!(matches!(end, Some(Err(TrackingError::LocationUnavailable(_)))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_timestamps_use_playback_time() {
        let source = ReplaySource::from_json(
            r#"[{"latitude": 1.0, "longitude": 2.0}, {"latitude": 1.001, "longitude": 2.0}]"#,
            Duration::from_millis(10),
        )
        .unwrap();
        let mut feed = source.open();
        let first = feed.recv().await.unwrap().unwrap();
        let second = feed.recv().await.unwrap().unwrap();
        assert!(second.captured_at >= first.captured_at);
        assert!(feed.recv().await.is_none());
    }
}

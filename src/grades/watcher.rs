//! Polling loop over the grade-change feed.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;

use super::client::{GradeFeed, RankRefresher};
use super::seen::SeenKeys;

/// Counts from one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    /// Changes returned by the feed.
    pub observed: usize,
    /// Changes not seen before.
    pub new: usize,
    /// New changes whose player was refreshed.
    pub refreshed: usize,
    /// New changes whose refresh failed; they are retried next poll.
    pub failed: usize,
    /// Keys forgotten before filtering.
    pub evicted: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_players: Vec<String>,
}

/// Refreshes the rank of every player with a new grade change.
pub struct GradeWatcher<G, R> {
    feed: G,
    refresher: R,
    seen: SeenKeys,
}

impl<G: GradeFeed, R: RankRefresher> GradeWatcher<G, R> {
    pub fn new(feed: G, refresher: R, seen: SeenKeys) -> Self {
        Self {
            feed,
            refresher,
            seen,
        }
    }

    #[must_use]
    pub fn seen(&self) -> &SeenKeys {
        &self.seen
    }

    /// Fetch the feed once and refresh players of unseen changes.
    ///
    /// A change is remembered only after its refresh succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed itself cannot be read. Individual
    /// refresh failures are counted, not returned.
    pub async fn poll(&mut self) -> Result<PollReport> {
        let changes = self.feed.fetch_changes().await?;

        let mut report = PollReport {
            observed: changes.len(),
            evicted: self.seen.evict_for(changes.len()),
            ..PollReport::default()
        };

        let mut pending = HashSet::new();
        for change in changes {
            let key = change.key();
            if self.seen.contains(&key) || !pending.insert(key.clone()) {
                continue;
            }
            report.new += 1;

            match self.refresher.refresh(&change.username).await {
                Ok(()) => {
                    debug!(username = %change.username, %key, "Rank refreshed");
                    self.seen.insert(key);
                    report.refreshed += 1;
                }
                Err(e) => {
                    warn!(username = %change.username, error = %e, "Rank refresh failed");
                    report.failed += 1;
                    report.failed_players.push(change.username);
                }
            }
        }

        info!(
            observed = report.observed,
            new = report.new,
            refreshed = report.refreshed,
            failed = report.failed,
            "Grade changes checked"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::grades::client::{GradeChange, StartTime};
    use std::sync::Mutex;

    struct FakeFeed {
        polls: Mutex<Vec<Result<Vec<GradeChange>>>>,
    }

    impl FakeFeed {
        fn new(polls: Vec<Result<Vec<GradeChange>>>) -> Self {
            let mut polls = polls;
            polls.reverse();
            Self {
                polls: Mutex::new(polls),
            }
        }
    }

    impl GradeFeed for FakeFeed {
        async fn fetch_changes(&self) -> Result<Vec<GradeChange>> {
            self.polls
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct FakeRefresher {
        refreshed: Mutex<Vec<String>>,
        failing: Mutex<HashSet<String>>,
    }

    impl RankRefresher for FakeRefresher {
        async fn refresh(&self, username: &str) -> Result<()> {
            if self.failing.lock().unwrap().contains(username) {
                return Err(Error::Transport {
                    url: "rank".into(),
                    message: "timed out".into(),
                });
            }
            self.refreshed.lock().unwrap().push(username.to_string());
            Ok(())
        }
    }

    fn change(t: i64, name: &str) -> GradeChange {
        GradeChange {
            starttime: StartTime::Number(t),
            username: name.to_string(),
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_only_unseen_changes_are_refreshed() {
        let feed = FakeFeed::new(vec![
            Ok(vec![change(1, "Alice"), change(2, "Bob")]),
            Ok(vec![change(1, "Alice"), change(2, "Bob"), change(3, "Carol")]),
        ]);
        let mut watcher = GradeWatcher::new(feed, FakeRefresher::default(), SeenKeys::default());

        let first = watcher.poll().await.unwrap();
        assert_eq!((first.observed, first.new, first.refreshed), (2, 2, 2));

        let second = watcher.poll().await.unwrap();
        assert_eq!((second.observed, second.new, second.refreshed), (3, 1, 1));
        assert_eq!(
            *watcher.refresher.refreshed.lock().unwrap(),
            vec!["Alice", "Bob", "Carol"]
        );
    }

    #[tokio::test]
    async fn test_failed_refresh_is_retried_next_poll() {
        let feed = FakeFeed::new(vec![
            Ok(vec![change(1, "Alice"), change(2, "Bob")]),
            Ok(vec![change(1, "Alice"), change(2, "Bob")]),
        ]);
        let refresher = FakeRefresher::default();
        refresher.failing.lock().unwrap().insert("Bob".into());
        let mut watcher = GradeWatcher::new(feed, refresher, SeenKeys::default());

        let first = watcher.poll().await.unwrap();
        assert_eq!(first.failed, 1);
        assert_eq!(first.failed_players, vec!["Bob"]);
        assert!(!watcher.seen().contains("2.Bob"));

        watcher.refresher.failing.lock().unwrap().clear();
        let second = watcher.poll().await.unwrap();
        assert_eq!((second.new, second.refreshed, second.failed), (1, 1, 0));
        assert!(watcher.seen().contains("2.Bob"));
    }

    #[tokio::test]
    async fn test_seen_set_is_bounded_by_poll_size_plus_margin() {
        let many: Vec<GradeChange> = (0..10).map(|i| change(i, "P")).collect();
        let feed = FakeFeed::new(vec![Ok(many), Ok(vec![change(100, "Q")])]);
        let mut watcher = GradeWatcher::new(feed, FakeRefresher::default(), SeenKeys::new(3));

        watcher.poll().await.unwrap();
        assert_eq!(watcher.seen().len(), 10);

        let second = watcher.poll().await.unwrap();
        // Trimmed to 1 + 3 before filtering, then the new key is added.
        assert_eq!(second.evicted, 6);
        assert_eq!(watcher.seen().len(), 5);
        assert!(watcher.seen().contains("9.P"));
        assert!(!watcher.seen().contains("0.P"));
    }

    #[tokio::test]
    async fn test_duplicate_entries_in_one_poll_refresh_once() {
        let feed = FakeFeed::new(vec![Ok(vec![change(1, "Alice"), change(1, "Alice")])]);
        let mut watcher = GradeWatcher::new(feed, FakeRefresher::default(), SeenKeys::default());

        let report = watcher.poll().await.unwrap();
        assert_eq!((report.observed, report.new, report.refreshed), (2, 1, 1));
    }

    #[tokio::test]
    async fn test_feed_failure_is_an_error() {
        let feed = FakeFeed::new(vec![Err(Error::Transport {
            url: "feed".into(),
            message: "HTTP 502".into(),
        })]);
        let mut watcher = GradeWatcher::new(feed, FakeRefresher::default(), SeenKeys::default());

        assert!(watcher.poll().await.is_err());
        assert!(watcher.seen().is_empty());
    }
}

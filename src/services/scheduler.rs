use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Requests allowed in flight at once.
    pub max_concurrent: usize,
    /// Minimum gap between two request starts.
    pub min_interval_ms: u64,
    /// Cap on request starts per rolling minute.
    pub max_per_minute: Option<u32>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            min_interval_ms: 1000,
            max_per_minute: Some(60),
        }
    }
}

impl SchedulerConfig {
    /// No pacing and a generous concurrency bound, for offline providers.
    pub fn unthrottled() -> Self {
        Self {
            max_concurrent: 16,
            min_interval_ms: 0,
            max_per_minute: None,
        }
    }
}

#[derive(Debug, Default)]
struct Pacing {
    last_start: Option<Instant>,
    recent_starts: VecDeque<Instant>,
}

/// Paces calls to an external API: bounded concurrency, a minimum interval
/// between starts and an optional per-minute cap.
#[derive(Debug)]
pub struct RequestScheduler {
    permits: Semaphore,
    min_interval: Duration,
    max_per_minute: Option<usize>,
    pacing: Mutex<Pacing>,
}

impl RequestScheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            permits: Semaphore::new(config.max_concurrent.max(1)),
            min_interval: Duration::from_millis(config.min_interval_ms),
            max_per_minute: config
                .max_per_minute
                .filter(|cap| *cap > 0)
                .map(|cap| cap as usize),
            pacing: Mutex::new(Pacing::default()),
        }
    }

    pub fn unthrottled() -> Self {
        Self::new(&SchedulerConfig::unthrottled())
    }

    /// Run `task` once a concurrency slot is free and the pacing rules allow
    /// another start.
    pub async fn run<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // The semaphore is never closed, so acquire only fails if that changes.
        let _permit = self.permits.acquire().await.ok();
        self.wait_turn().await;
        task().await
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    async fn wait_turn(&self) {
        let mut pacing = self.pacing.lock().await;

        loop {
            let now = Instant::now();
            let mut ready_at = now;

            if let Some(last_start) = pacing.last_start {
                ready_at = ready_at.max(last_start + self.min_interval);
            }

            if let Some(cap) = self.max_per_minute {
                while let Some(&oldest) = pacing.recent_starts.front() {
                    if now.duration_since(oldest) >= RATE_WINDOW {
                        pacing.recent_starts.pop_front();
                    } else {
                        break;
                    }
                }
                if pacing.recent_starts.len() >= cap {
                    if let Some(&oldest) = pacing.recent_starts.front() {
                        ready_at = ready_at.max(oldest + RATE_WINDOW);
                    }
                }
            }

            if ready_at <= now {
                pacing.last_start = Some(now);
                if self.max_per_minute.is_some() {
                    pacing.recent_starts.push_back(now);
                }
                return;
            }

            log::debug!(
                "Rate limit: waiting {:?} before next request",
                ready_at.duration_since(now)
            );
            tokio::time::sleep_until(ready_at).await;
        }
    }
}

impl Default for RequestScheduler {
    fn default() -> Self {
        Self::new(&SchedulerConfig::default())
    }
}

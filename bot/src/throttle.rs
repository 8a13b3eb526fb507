//! Per-identity cooldown gate.
//!
//! One processed message per identity per cooldown window — a token-per-
//! window gate, not a sliding window. A rejected message does not refresh
//! the marker, so the window is measured from the last *processed* message.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

pub struct Throttle {
    cooldown: Duration,
    last_processed: Mutex<HashMap<i64, Instant>>,
}

impl Throttle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_processed: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` when the message may be processed, marking the
    /// identity as recently active; `false` while on cooldown.
    pub async fn acquire(&self, identity: i64) -> bool {
        self.acquire_at(identity, Instant::now()).await
    }

    async fn acquire_at(&self, identity: i64, now: Instant) -> bool {
        let mut seen = self.last_processed.lock().await;
        if let Some(mark) = seen.get(&identity) {
            if now.duration_since(*mark) < self.cooldown {
                return false;
            }
        }
        seen.insert(identity, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_message_within_window_is_rejected() {
        let throttle = Throttle::new(Duration::from_secs(2));
        let t0 = Instant::now();
        assert!(throttle.acquire_at(1, t0).await);
        assert!(!throttle.acquire_at(1, t0 + Duration::from_millis(500)).await);
        assert!(throttle.acquire_at(1, t0 + Duration::from_secs(3)).await);
    }

    #[tokio::test]
    async fn identities_are_throttled_independently() {
        let throttle = Throttle::new(Duration::from_secs(2));
        let t0 = Instant::now();
        assert!(throttle.acquire_at(1, t0).await);
        assert!(throttle.acquire_at(2, t0).await);
        assert!(!throttle.acquire_at(1, t0 + Duration::from_secs(1)).await);
        assert!(!throttle.acquire_at(2, t0 + Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn rejection_does_not_extend_the_cooldown() {
        let throttle = Throttle::new(Duration::from_secs(2));
        let t0 = Instant::now();
        assert!(throttle.acquire_at(1, t0).await);
        assert!(!throttle.acquire_at(1, t0 + Duration::from_secs(1)).await);
        // 2.5s after the processed message — past the window even though a
        // rejected message arrived in between.
        assert!(throttle.acquire_at(1, t0 + Duration::from_millis(2500)).await);
    }
}

//! Per-client rate limiting as a dispatch gate.

use std::net::IpAddr;
use std::time::Instant;

use dashmap::DashMap;
use http::StatusCode;

use crate::config::RateLimitConfig;
use crate::dispatch::{Admission, DispatchGate};
use crate::message::properties::keys;
use crate::message::{HttpMessage, HttpResponse};
use crate::session::ResponseCorrelator;

/// Tracked clients before new arrivals trigger a prune.
const PRUNE_THRESHOLD: usize = 4096;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// True once the bucket would have refilled to capacity by `now`.
    fn is_full(&self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens + elapsed * refill_rate >= capacity
    }
}

/// Rejects requests from clients that exceed their budget with
/// `429 Too Many Requests`. Requests without a known peer address pass.
#[derive(Debug)]
pub struct RateLimitGate {
    buckets: DashMap<IpAddr, TokenBucket>,
    rps: f64,
    burst: f64,
}

impl RateLimitGate {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            rps: config.requests_per_second as f64,
            burst: config.burst_size as f64,
        }
    }

    /// Take one token for `client`.
    pub fn check(&self, client: IpAddr) -> bool {
        if self.buckets.len() >= PRUNE_THRESHOLD && !self.buckets.contains_key(&client) {
            self.prune();
        }
        let mut bucket = self
            .buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(self.burst));
        bucket.try_acquire(self.burst, self.rps)
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Forget clients whose buckets have refilled. A fresh bucket starts
    /// full, so this loses no state.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| !bucket.is_full(self.burst, self.rps, now));
        let pruned = before.saturating_sub(self.buckets.len());
        if pruned > 0 {
            tracing::debug!(pruned, remaining = self.buckets.len(), "Pruned idle rate-limit buckets");
        }
        pruned
    }
}

impl DispatchGate for RateLimitGate {
    fn admit(&self, message: &HttpMessage, correlator: ResponseCorrelator) -> Admission {
        let Some(peer) = message.properties().get_addr(keys::REMOTE_ADDRESS) else {
            return Admission::Forward(correlator);
        };

        if self.check(peer.ip()) {
            return Admission::Forward(correlator);
        }

        tracing::warn!(client = %peer.ip(), connection_id = %correlator.connection().id(), "Rate limit exceeded");
        correlator.complete(
            HttpResponse::text(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").with_header("retry-after", "1"),
        );
        Admission::ShortCircuit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(rps: u32, burst: u32) -> RateLimitGate {
        RateLimitGate::new(&RateLimitConfig {
            enabled: true,
            requests_per_second: rps,
            burst_size: burst,
        })
    }

    #[test]
    fn burst_then_reject() {
        let gate = gate(1, 3);
        let client: IpAddr = "10.0.0.1".parse().unwrap();

        assert!(gate.check(client));
        assert!(gate.check(client));
        assert!(gate.check(client));
        assert!(!gate.check(client));
    }

    #[test]
    fn clients_have_separate_buckets() {
        let gate = gate(1, 1);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(gate.check(a));
        assert!(!gate.check(a));
        assert!(gate.check(b));
        assert_eq!(gate.tracked_clients(), 2);
    }

    #[test]
    fn prune_forgets_only_refilled_clients() {
        let gate = gate(1, 2);
        let client: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(gate.check(client));

        assert_eq!(gate.prune(), 0);
        assert_eq!(gate.tracked_clients(), 1);
    }

    #[test]
    fn prune_drops_idle_clients() {
        let gate = gate(1000, 1);
        let client: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(gate.check(client));

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(gate.prune(), 1);
        assert_eq!(gate.tracked_clients(), 0);
        assert!(gate.check(client));
    }
}

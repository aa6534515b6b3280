use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use http::{header, HeaderMap, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Outcome of counting one request against its client's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

/// Fixed window counter per client address. A client's window opens on its
/// first request and the count starts over once the window has elapsed.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: DashMap<IpAddr, Window>,
    max: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        FixedWindowLimiter {
            windows: DashMap::new(),
            max,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check(&self, client: IpAddr) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: IpAddr, now: Instant) -> RateDecision {
        // The entry guard holds the shard lock, so reset and increment are one step.
        let mut entry = self.windows.entry(client).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                hits: 0,
            };
        }
        entry.hits = entry.hits.saturating_add(1);
        let current = *entry;
        drop(entry);

        RateDecision {
            allowed: current.hits <= self.max,
            limit: self.max,
            remaining: self.max.saturating_sub(current.hits),
            reset_after: self
                .window
                .saturating_sub(now.duration_since(current.started)),
        }
    }

    /// Drops windows that have fully elapsed. Returns how many were removed.
    pub fn prune_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// `RateLimit-*` headers (IETF draft 6 names), set on every counted response.
    pub fn apply_headers(&self, decision: &RateDecision, headers: &mut HeaderMap) {
        let reset = reset_secs(decision.reset_after);
        headers.insert(
            "ratelimit-policy",
            header_value(format!("{};w={}", decision.limit, self.window.as_secs())),
        );
        headers.insert("ratelimit-limit", HeaderValue::from(decision.limit));
        headers.insert("ratelimit-remaining", HeaderValue::from(decision.remaining));
        headers.insert("ratelimit-reset", HeaderValue::from(reset));
        if !decision.allowed {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(reset));
        }
    }

    pub fn rejection(&self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(rejection_message(self.window))));
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

/// Periodically clears elapsed windows so idle clients do not accumulate.
pub fn spawn_pruner(limiter: Arc<FixedWindowLimiter>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(limiter.window());
        // First tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.prune_expired(Instant::now());
            debug!(
                "Pruned {} expired rate limit windows, {} still tracked",
                removed,
                limiter.tracked_clients()
            );
        }
    })
}

pub fn rejection_message(window: Duration) -> String {
    let secs = window.as_secs();
    let span = match (secs / 60, secs % 60) {
        (1, 0) => "1 minute".to_string(),
        (minutes, 0) if minutes > 0 => format!("{} minutes", minutes),
        _ if secs == 1 => "1 second".to_string(),
        _ => format!("{} seconds", secs),
    };
    format!("Too many requests from this IP, please try again after {}", span)
}

fn reset_secs(reset_after: Duration) -> u64 {
    reset_after.as_secs() + u64::from(reset_after.subsec_nanos() > 0)
}

fn header_value(value: String) -> HeaderValue {
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

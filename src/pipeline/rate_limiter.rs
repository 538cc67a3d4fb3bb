//! Request budget shared by every site adapter
//!
//! This module handles:
//! - A global concurrency ceiling via a tokio semaphore
//! - A sliding window capping how many fetches start per window
//! - RAII permits released on completion, failure or cancellation

use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Returned to waiters once the limiter has been closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Rate limiter closed")]
pub struct LimiterClosed;

/// A granted slot authorizing one fetch; released on drop
#[derive(Debug)]
pub struct RatePermit {
    _permit: OwnedSemaphorePermit,
}

/// Throttles concurrent and per-window requests
#[derive(Debug)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    window: Duration,
    max_per_window: usize,
    /// Instants at which permits were granted within the current window
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, max_per_window: usize, window: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            window,
            max_per_window: max_per_window.max(1),
            grants: Mutex::new(VecDeque::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.max_concurrent as usize,
            config.requests_per_window as usize,
            Duration::from_millis(config.window_ms),
        )
    }

    /// Waits for a slot under both the concurrency and window ceilings
    ///
    /// Dropping the returned future while it waits leaks nothing.
    pub async fn acquire(&self) -> Result<RatePermit, LimiterClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LimiterClosed)?;

        while let Some(delay) = self.reserve_window_slot() {
            tracing::trace!("Request window full, waiting {:?}", delay);
            tokio::time::sleep(delay).await;
            if self.semaphore.is_closed() {
                return Err(LimiterClosed);
            }
        }

        Ok(RatePermit { _permit: permit })
    }

    /// Records a grant if the window has room; otherwise returns how long
    /// until the oldest grant leaves the window
    fn reserve_window_slot(&self) -> Option<Duration> {
        let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        while let Some(&oldest) = grants.front() {
            if now.duration_since(oldest) >= self.window {
                grants.pop_front();
            } else {
                break;
            }
        }

        if grants.len() < self.max_per_window {
            grants.push_back(now);
            None
        } else {
            let oldest = grants.front().copied().unwrap_or(now);
            Some(self.window.saturating_sub(now.duration_since(oldest)))
        }
    }

    /// Wakes every waiter with `LimiterClosed`; later acquires fail too
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

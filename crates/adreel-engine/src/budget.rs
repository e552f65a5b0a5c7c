//! Per-process rate budgets for engine adapters.

use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::error::{EngineError, EngineResult};

/// A per-process request budget for one engine adapter.
///
/// Exceeding the budget surfaces as `EngineError::Transient`, which sends
/// the call through the normal bounded-backoff path.
pub struct RateBudget {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    name: &'static str,
}

impl RateBudget {
    /// Create a budget of `per_minute` requests per minute.
    pub fn per_minute(name: &'static str, per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(per_minute.max(1)).expect("nonzero"));
        Self {
            limiter: RateLimiter::direct(quota),
            name,
        }
    }

    /// Take one unit of budget, or fail transiently.
    pub fn try_acquire(&self) -> EngineResult<()> {
        self.limiter.check().map_err(|_| {
            metrics::counter!("engine_budget_exhausted_total", "adapter" => self.name.to_string())
                .increment(1);
            EngineError::transient(format!("{} rate budget exhausted", self.name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_allows_within_quota() {
        let budget = RateBudget::per_minute("test", 10);
        for _ in 0..10 {
            assert!(budget.try_acquire().is_ok());
        }
    }

    #[test]
    fn test_exhausted_budget_is_transient() {
        let budget = RateBudget::per_minute("test", 1);
        assert!(budget.try_acquire().is_ok());
        let err = budget.try_acquire().unwrap_err();
        assert!(err.is_retryable());
    }
}

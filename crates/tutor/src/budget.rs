//! Daily token budget ledger.
//!
//! Usage is tracked per user, per course, per UTC day. The pre-check is
//! advisory (a character-count estimate plus a fixed response margin);
//! the post-check records the provider's reported totals. Nothing is
//! ever reserved, so a turn in flight does not block a concurrent one.

use chrono::Utc;
use coursepilot_core::error::Result;
use coursepilot_core::store::BudgetStore;
use std::sync::Arc;
use tracing::debug;

/// Fixed margin added to the prompt estimate to cover the response.
pub const RESPONSE_MARGIN: u32 = 500;

/// Rough token estimate for a text, ~4 characters per token.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.len() / 4) as u32
}

/// Ledger over a [`BudgetStore`] with a fixed daily limit.
pub struct BudgetLedger {
    store: Arc<dyn BudgetStore>,
    daily_limit: u32,
}

impl BudgetLedger {
    pub fn new(store: Arc<dyn BudgetStore>, daily_limit: u32) -> Self {
        Self { store, daily_limit }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Tokens the user has consumed in this course today (UTC).
    pub async fn usage_today(&self, user_id: &str, course_id: &str) -> Result<u32> {
        let today = Utc::now().date_naive();
        Ok(self.store.usage_on(user_id, course_id, today).await?)
    }

    /// Tokens left today, saturating at zero.
    pub async fn remaining(&self, user_id: &str, course_id: &str) -> Result<u32> {
        let used = self.usage_today(user_id, course_id).await?;
        Ok(self.daily_limit.saturating_sub(used))
    }

    /// Whether a request with the given estimate fits under the cap.
    ///
    /// Strict comparison: a request whose estimate lands exactly on the
    /// limit is rejected.
    pub async fn has_capacity(
        &self,
        user_id: &str,
        course_id: &str,
        estimated_tokens: u32,
    ) -> Result<bool> {
        let used = self.usage_today(user_id, course_id).await?;
        Ok(used as u64 + (estimated_tokens as u64) < self.daily_limit as u64)
    }

    /// Record actual consumption and return the new daily total.
    ///
    /// The storage upsert is atomic, so concurrent turns for the same
    /// user and course both land.
    pub async fn record(&self, user_id: &str, course_id: &str, tokens: u32) -> Result<u32> {
        let today = Utc::now().date_naive();
        let total = self
            .store
            .add_usage(user_id, course_id, today, tokens)
            .await?;
        debug!(user_id, course_id, tokens, total, "Recorded token usage");
        Ok(total)
    }
}

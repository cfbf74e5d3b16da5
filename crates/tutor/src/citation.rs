//! Citation construction.
//!
//! Citations are derived on demand: from the live retrieval set during
//! a turn, or from the passage ids stored on a historical assistant
//! message.

use coursepilot_core::error::Result;
use coursepilot_core::passage::{Citation, Passage};
use coursepilot_core::store::PassageStore;

/// Citations for a retrieval set, one per passage in input order.
pub fn from_passages(passages: &[Passage]) -> Vec<Citation> {
    passages.iter().map(Citation::from_passage).collect()
}

/// Reconstruct citations from stored passage ids.
///
/// Ids that no longer resolve are silently dropped; the remaining
/// citations follow the store's return order.
pub async fn from_ids(store: &dyn PassageStore, ids: &[String]) -> Result<Vec<Citation>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let passages = store.get_by_ids(ids).await?;
    Ok(from_passages(&passages))
}

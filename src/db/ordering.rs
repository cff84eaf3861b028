//! Persisting drag-and-drop reorders.

use super::{TaskScope, now_ms};
use crate::types::{ReorderItem, ReorderOutcome};
use anyhow::Result;
use rusqlite::{TransactionBehavior, params};
use tracing::debug;

impl TaskScope<'_> {
    /// Store new order positions for the owner's tasks.
    ///
    /// Ids the owner does not own (stale or foreign) are skipped and
    /// reported, not rejected. The batch is applied in one transaction, so
    /// a storage failure leaves every position as it was.
    pub fn reorder(&self, items: &[ReorderItem]) -> Result<ReorderOutcome> {
        let now = now_ms();

        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut outcome = ReorderOutcome::default();

            {
                let mut stmt = tx.prepare(
                    "UPDATE tasks SET sort_order = ?1, updated_at = ?2
                     WHERE id = ?3 AND user_id IS ?4",
                )?;
                for item in items {
                    let changed = stmt.execute(params![item.order, now, &item.id, self.owner])?;
                    if changed == 0 {
                        outcome.skipped.push(item.id.clone());
                    } else {
                        outcome.updated += 1;
                    }
                }
            }

            tx.commit()?;
            debug!(
                updated = outcome.updated,
                skipped = outcome.skipped.len(),
                "Reordered tasks"
            );
            Ok(outcome)
        })
    }
}

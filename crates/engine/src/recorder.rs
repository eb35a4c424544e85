//! Settlement recording on a loaded [`Ledger`].
//!
//! This is the only mutation the ledger supports. A settled expense (or
//! item) drops out of every later balance computation; its history stays in
//! [`Ledger::expenses`] with `include_settled = true`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{EngineError, Ledger, ResultEngine, expenses::SettlementMark};

impl Ledger {
    /// Marks a whole expense as settled.
    ///
    /// Fails with [`EngineError::AlreadySettled`] if it already is, leaving
    /// the first settlement record untouched.
    pub fn settle_expense(
        &mut self,
        expense_id: Uuid,
        settled_by: &str,
        settled_at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let expense = self.expense_mut(expense_id)?;
        if expense.is_settled() {
            return Err(EngineError::AlreadySettled(format!("expense {expense_id}")));
        }
        expense.settlement = Some(SettlementMark {
            settled_by: settled_by.to_string(),
            settled_at,
        });
        Ok(())
    }

    /// Marks a single item as settled. An item of an already settled expense
    /// counts as settled.
    pub fn settle_item(
        &mut self,
        item_id: Uuid,
        settled_by: &str,
        settled_at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let (expense_settled, item) = self.item_mut(item_id)?;
        if expense_settled || item.is_settled() {
            return Err(EngineError::AlreadySettled(format!("expense item {item_id}")));
        }
        item.settlement = Some(SettlementMark {
            settled_by: settled_by.to_string(),
            settled_at,
        });
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use sea_orm::{QueryFilter, TransactionTrait, prelude::*, sea_query::Expr};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, expense_items, expenses, util::normalize_username};

use super::{Engine, with_tx};

impl Engine {
    /// Mark an expense as settled by `settled_by`, a member of its trip.
    ///
    /// The write only happens if the expense is not settled yet, so of two
    /// concurrent calls exactly one succeeds; the other gets
    /// [`EngineError::AlreadySettled`].
    pub async fn record_settlement(
        &self,
        expense_id: Uuid,
        settled_by: &str,
        settled_at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let settled_by = normalize_username(settled_by)?;

        with_tx!(self, |db_tx| {
            let expense = expenses::Entity::find_by_id(expense_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("expense {expense_id}")))?;
            self.require_member(&db_tx, expense.trip_code, &settled_by)
                .await?;

            let updated = expenses::Entity::update_many()
                .col_expr(expenses::Column::SettledAt, Expr::value(settled_at))
                .col_expr(expenses::Column::SettledBy, Expr::value(settled_by.clone()))
                .filter(expenses::Column::Id.eq(expense_id.to_string()))
                .filter(expenses::Column::SettledAt.is_null())
                .exec(&db_tx)
                .await?;
            if updated.rows_affected == 0 {
                tracing::warn!(%expense_id, %settled_by, "expense already settled");
                return Err(EngineError::AlreadySettled(format!("expense {expense_id}")));
            }
            self.touch_trip(&db_tx, expense.trip_code).await?;

            tracing::debug!(%expense_id, %settled_by, "expense settled");
            Ok(())
        })
    }

    /// Mark a single expense item as settled. Items of a settled expense
    /// count as settled already.
    pub async fn record_item_settlement(
        &self,
        item_id: Uuid,
        settled_by: &str,
        settled_at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let settled_by = normalize_username(settled_by)?;

        with_tx!(self, |db_tx| {
            let (item, expense) = expense_items::Entity::find_by_id(item_id.to_string())
                .find_also_related(expenses::Entity)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("expense item {item_id}")))?;
            let expense = expense.ok_or_else(|| {
                EngineError::InconsistentLedger(format!(
                    "expense item {item_id} belongs to missing expense {}",
                    item.expense_id
                ))
            })?;
            self.require_member(&db_tx, expense.trip_code, &settled_by)
                .await?;

            if expense.settled_at.is_some() {
                tracing::warn!(%item_id, %settled_by, "expense of item already settled");
                return Err(EngineError::AlreadySettled(format!("expense item {item_id}")));
            }

            let updated = expense_items::Entity::update_many()
                .col_expr(expense_items::Column::SettledAt, Expr::value(settled_at))
                .col_expr(
                    expense_items::Column::SettledBy,
                    Expr::value(settled_by.clone()),
                )
                .filter(expense_items::Column::Id.eq(item_id.to_string()))
                .filter(expense_items::Column::SettledAt.is_null())
                .exec(&db_tx)
                .await?;
            if updated.rows_affected == 0 {
                tracing::warn!(%item_id, %settled_by, "expense item already settled");
                return Err(EngineError::AlreadySettled(format!("expense item {item_id}")));
            }
            self.touch_trip(&db_tx, expense.trip_code).await?;

            tracing::debug!(%item_id, %settled_by, "expense item settled");
            Ok(())
        })
    }
}

use std::collections::BTreeSet;

use sea_orm::{ActiveValue, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Expense, MemberId, ResultEngine, Trip, TripCode, expense_items, expenses,
    item_assignments,
};

use super::{Engine, with_tx};

impl Engine {
    /// Record an expense with its items and assignments.
    ///
    /// The expense is checked against the trip (currency, membership, items
    /// partitioning the total) before anything is written; a rejected
    /// expense leaves the store untouched.
    pub async fn add_expense(&self, code: TripCode, expense: Expense) -> ResultEngine<Uuid> {
        with_tx!(self, |db_tx| {
            let trip = Trip::try_from(self.require_trip(&db_tx, code).await?)?;
            if expense.amount.currency() != trip.currency {
                return Err(EngineError::CurrencyMismatch(format!(
                    "trip {code} is in {}, expense is in {}",
                    trip.currency,
                    expense.amount.currency()
                )));
            }

            let members: BTreeSet<MemberId> = self
                .load_members(&db_tx, code)
                .await?
                .into_iter()
                .map(|member| member.id)
                .collect();
            expense.validate(trip.currency, |member| members.contains(&member))?;

            let mut expense_model = expenses::ActiveModel::from(&expense);
            expense_model.trip_code = ActiveValue::Set(i64::from(code));
            expense_model.insert(&db_tx).await?;

            for (position, item) in expense.items.iter().enumerate() {
                let mut item_model = expense_items::ActiveModel::from(item);
                item_model.expense_id = ActiveValue::Set(expense.id.to_string());
                item_model.position = ActiveValue::Set(i32::try_from(position).map_err(|_| {
                    EngineError::InvalidAmount("too many items in one expense".to_string())
                })?);
                item_model.insert(&db_tx).await?;

                for assignment in &item.assignments {
                    let mut assignment_model = item_assignments::ActiveModel::from(assignment);
                    assignment_model.item_id = ActiveValue::Set(item.id.to_string());
                    item_assignments::Entity::insert(assignment_model)
                        .exec(&db_tx)
                        .await?;
                }
            }
            self.touch_trip(&db_tx, i64::from(code)).await?;

            tracing::debug!(
                trip = %code,
                expense = %expense.id,
                amount = %expense.amount,
                items = expense.items.len(),
                "expense recorded"
            );
            Ok(expense.id)
        })
    }
}

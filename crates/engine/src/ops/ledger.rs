use std::collections::HashMap;

use sea_orm::{JoinType, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};

use crate::{
    Balances, Expense, ExpenseItem, Ledger, ResultEngine, SettlementTransfer, Trip, TripCode,
    compute_balances, compute_settlement_plan, expense_items, expenses, item_assignments,
    util::model_currency,
};

use super::{Engine, with_tx};

impl Engine {
    /// Load a consistent snapshot of a trip: members, expenses with their
    /// items and assignments, settled ones included.
    ///
    /// Expenses come ordered by occurrence time, items in insertion order.
    pub async fn load_ledger(&self, code: TripCode) -> ResultEngine<Ledger> {
        with_tx!(self, |db_tx| {
            let trip = Trip::try_from(self.require_trip(&db_tx, code).await?)?;
            let members = self.load_members(&db_tx, code).await?;

            let expense_models = expenses::Entity::find()
                .filter(expenses::Column::TripCode.eq(i64::from(code)))
                .order_by_asc(expenses::Column::OccurredAt)
                .order_by_asc(expenses::Column::Id)
                .all(&db_tx)
                .await?;

            let item_models = expense_items::Entity::find()
                .join(JoinType::InnerJoin, expense_items::Relation::Expenses.def())
                .filter(expenses::Column::TripCode.eq(i64::from(code)))
                .order_by_asc(expense_items::Column::ExpenseId)
                .order_by_asc(expense_items::Column::Position)
                .all(&db_tx)
                .await?;

            let assignment_models = item_assignments::Entity::find()
                .join(
                    JoinType::InnerJoin,
                    item_assignments::Relation::ExpenseItems.def(),
                )
                .join(JoinType::InnerJoin, expense_items::Relation::Expenses.def())
                .filter(expenses::Column::TripCode.eq(i64::from(code)))
                .order_by_asc(item_assignments::Column::MemberId)
                .all(&db_tx)
                .await?;

            let mut assignments_by_item: HashMap<String, Vec<item_assignments::Model>> =
                HashMap::new();
            for assignment in assignment_models {
                assignments_by_item
                    .entry(assignment.item_id.clone())
                    .or_default()
                    .push(assignment);
            }

            let mut items_by_expense: HashMap<String, Vec<expense_items::Model>> = HashMap::new();
            for item in item_models {
                items_by_expense
                    .entry(item.expense_id.clone())
                    .or_default()
                    .push(item);
            }

            let mut ledger_expenses = Vec::with_capacity(expense_models.len());
            for model in expense_models {
                let currency = model_currency(&model.currency)?;
                let items = items_by_expense
                    .remove(&model.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|item| {
                        let assignments = assignments_by_item
                            .get(&item.id)
                            .map(Vec::as_slice)
                            .unwrap_or_default();
                        ExpenseItem::try_from((item, assignments, currency))
                    })
                    .collect::<ResultEngine<Vec<_>>>()?;
                ledger_expenses.push(Expense::try_from((model, currency, items))?);
            }

            let ledger = Ledger::new(trip, members, ledger_expenses)?;
            tracing::debug!(
                trip = %code,
                members = ledger.members().count(),
                expenses = ledger.expenses(true).count(),
                "ledger loaded"
            );
            Ok(ledger)
        })
    }

    /// Outstanding balances of every member of a trip.
    pub async fn trip_balances(&self, code: TripCode) -> ResultEngine<Balances> {
        let ledger = self.load_ledger(code).await?;
        compute_balances(&ledger)
    }

    /// Transfers that settle a trip's outstanding balances.
    pub async fn trip_settlement_plan(
        &self,
        code: TripCode,
    ) -> ResultEngine<Vec<SettlementTransfer>> {
        let ledger = self.load_ledger(code).await?;
        let plan = compute_settlement_plan(&ledger)?;
        tracing::debug!(trip = %code, transfers = plan.len(), "settlement planned");
        Ok(plan)
    }
}

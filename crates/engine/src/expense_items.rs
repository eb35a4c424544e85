//! Expense items: the line items of an expense, each with its own amount and
//! its own set of assigned members.

use std::collections::{BTreeMap, BTreeSet};

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    Currency, EngineError, ItemAssignment, MemberId, Money, ResultEngine,
    expenses::SettlementMark, item_assignments, util::parse_uuid,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExpenseItem {
    pub id: Uuid,
    pub name: String,
    pub amount: Money,
    pub assignments: Vec<ItemAssignment>,
    pub settlement: Option<SettlementMark>,
}

impl ExpenseItem {
    pub fn new(name: impl Into<String>, amount: Money, assignments: Vec<ItemAssignment>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            amount,
            assignments,
            settlement: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }

    /// Resolves every assignee's share of this item, ordered by member id.
    ///
    /// Explicit shares are taken as given. What they leave of the item amount
    /// is split equally among the assignees without an explicit share, the
    /// residual minor units going to the lowest member ids. The result always
    /// sums to exactly `self.amount`; anything that cannot satisfy that is an
    /// [`EngineError::InconsistentLedger`].
    pub fn shares(&self) -> ResultEngine<Vec<(MemberId, Money)>> {
        let inconsistent = |reason: String| {
            EngineError::InconsistentLedger(format!("item \"{}\" ({}): {reason}", self.name, self.id))
        };

        if self.assignments.is_empty() {
            return Err(inconsistent("no assigned members".to_string()));
        }

        let currency = self.amount.currency();
        let mut resolved: BTreeMap<MemberId, Money> = BTreeMap::new();
        let mut implicit: BTreeSet<MemberId> = BTreeSet::new();
        let mut explicit_total = Money::zero(currency);

        for assignment in &self.assignments {
            if resolved.contains_key(&assignment.member) || implicit.contains(&assignment.member) {
                return Err(inconsistent(format!(
                    "member {} assigned twice",
                    assignment.member
                )));
            }
            match assignment.share {
                Some(share) => {
                    if share.currency() != currency {
                        return Err(inconsistent(format!(
                            "share in {} for an item in {}",
                            share.currency(),
                            currency
                        )));
                    }
                    if share.is_negative() {
                        return Err(inconsistent(format!("negative share {share}")));
                    }
                    explicit_total = explicit_total.checked_add(share)?;
                    resolved.insert(assignment.member, share);
                }
                None => {
                    implicit.insert(assignment.member);
                }
            }
        }

        let remainder = self.amount.checked_sub(explicit_total)?;
        if remainder.is_negative() {
            return Err(inconsistent(format!(
                "explicit shares sum to {explicit_total}, more than {}",
                self.amount
            )));
        }

        if implicit.is_empty() {
            if !remainder.is_zero() {
                return Err(inconsistent(format!(
                    "shares sum to {explicit_total}, expected {}",
                    self.amount
                )));
            }
        } else {
            let parts = remainder.split(implicit.len())?;
            resolved.extend(implicit.into_iter().zip(parts));
        }

        Ok(resolved.into_iter().collect())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub expense_id: String,
    pub position: i32,
    pub name: String,
    pub amount_minor: i64,
    pub settled_at: Option<DateTimeUtc>,
    pub settled_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expenses,
    #[sea_orm(has_many = "super::item_assignments::Entity")]
    ItemAssignments,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl Related<super::item_assignments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ItemAssignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ExpenseItem> for ActiveModel {
    fn from(value: &ExpenseItem) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            expense_id: ActiveValue::NotSet,
            position: ActiveValue::NotSet,
            name: ActiveValue::Set(value.name.clone()),
            amount_minor: ActiveValue::Set(value.amount.minor()),
            settled_at: ActiveValue::Set(value.settlement.as_ref().map(|s| s.settled_at)),
            settled_by: ActiveValue::Set(value.settlement.as_ref().map(|s| s.settled_by.clone())),
        }
    }
}

impl TryFrom<(Model, &[item_assignments::Model], Currency)> for ExpenseItem {
    type Error = EngineError;

    fn try_from(
        (model, assignments, currency): (Model, &[item_assignments::Model], Currency),
    ) -> ResultEngine<Self> {
        let settlement =
            SettlementMark::from_columns(model.settled_at, model.settled_by, "expense item")?;
        Ok(Self {
            id: parse_uuid(&model.id, "expense item")?,
            name: model.name,
            amount: Money::new(model.amount_minor, currency),
            assignments: assignments
                .iter()
                .map(|a| ItemAssignment::from_model(a, currency))
                .collect(),
            settlement,
        })
    }
}

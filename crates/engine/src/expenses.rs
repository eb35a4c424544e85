//! Expenses: one payment fronted by one member, made of one or more items.
//!
//! An expense recorded without itemization carries a single item covering
//! its whole amount (see [`Expense::unitemized`]), so the balance math only
//! ever deals with items.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    Currency, EngineError, ExpenseItem, ItemAssignment, MemberId, Money, ResultEngine,
    util::parse_uuid,
};

/// Who marked an expense (or item) as settled, and when.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SettlementMark {
    pub settled_by: String,
    pub settled_at: DateTime<Utc>,
}

impl SettlementMark {
    pub(crate) fn from_columns(
        settled_at: Option<DateTime<Utc>>,
        settled_by: Option<String>,
        label: &str,
    ) -> ResultEngine<Option<Self>> {
        match (settled_at, settled_by) {
            (Some(settled_at), Some(settled_by)) => Ok(Some(Self {
                settled_by,
                settled_at,
            })),
            (None, None) => Ok(None),
            _ => Err(EngineError::InconsistentLedger(format!(
                "{label} has a partial settlement record"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Expense {
    pub id: Uuid,
    pub payer: MemberId,
    pub description: String,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
    pub settlement: Option<SettlementMark>,
    pub items: Vec<ExpenseItem>,
}

impl Expense {
    /// Itemized expense. The items must add up to `amount`; that is checked
    /// when the expense joins a [`Ledger`](crate::Ledger) or is stored.
    pub fn new(
        payer: MemberId,
        description: impl Into<String>,
        amount: Money,
        occurred_at: DateTime<Utc>,
        items: Vec<ExpenseItem>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "expense amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            payer,
            description: description.into(),
            amount,
            occurred_at,
            settlement: None,
            items,
        })
    }

    /// Expense shared equally by `participants`, with one implicit item.
    pub fn unitemized(
        payer: MemberId,
        description: impl Into<String>,
        amount: Money,
        occurred_at: DateTime<Utc>,
        participants: &[MemberId],
    ) -> ResultEngine<Self> {
        if participants.is_empty() {
            return Err(EngineError::InvalidSplit(
                "an expense needs at least one participant".to_string(),
            ));
        }
        let description = description.into();
        let item = ExpenseItem::new(
            description.clone(),
            amount,
            participants
                .iter()
                .copied()
                .map(ItemAssignment::equal)
                .collect(),
        );
        Self::new(payer, description, amount, occurred_at, vec![item])
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }

    /// Items still counting towards balances: none once the expense is
    /// settled, otherwise every item not settled on its own.
    pub fn outstanding_items(&self) -> impl Iterator<Item = &ExpenseItem> {
        let settled = self.is_settled();
        self.items
            .iter()
            .filter(move |item| !settled && !item.is_settled())
    }

    /// Checks the expense against its trip: currency, membership of payer and
    /// assignees, and that the items partition the total exactly.
    pub(crate) fn validate<F>(&self, currency: Currency, is_member: F) -> ResultEngine<()>
    where
        F: Fn(MemberId) -> bool,
    {
        let inconsistent = |reason: String| {
            EngineError::InconsistentLedger(format!("expense {}: {reason}", self.id))
        };

        if self.amount.currency() != currency {
            return Err(inconsistent(format!(
                "amount in {}, trip currency is {}",
                self.amount.currency().code(),
                currency.code()
            )));
        }
        if !self.amount.is_positive() {
            return Err(inconsistent(format!("non-positive amount {}", self.amount)));
        }
        if !is_member(self.payer) {
            return Err(inconsistent(format!(
                "payer {} is not a trip member",
                self.payer
            )));
        }
        if self.items.is_empty() {
            return Err(inconsistent("no items".to_string()));
        }

        for item in &self.items {
            if item.amount.currency() != currency {
                return Err(inconsistent(format!(
                    "item \"{}\" is in {}",
                    item.name,
                    item.amount.currency().code()
                )));
            }
            if item.amount.is_negative() {
                return Err(inconsistent(format!(
                    "item \"{}\" has negative amount {}",
                    item.name, item.amount
                )));
            }
            for (member, _) in item.shares()? {
                if !is_member(member) {
                    return Err(inconsistent(format!(
                        "item \"{}\" is assigned to {member}, not a trip member",
                        item.name
                    )));
                }
            }
        }

        let items_total = Money::try_sum(currency, self.items.iter().map(|item| item.amount))?;
        if items_total != self.amount {
            return Err(inconsistent(format!(
                "items sum to {items_total}, expected {}",
                self.amount
            )));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub trip_code: i64,
    pub payer_id: i64,
    pub description: String,
    pub amount_minor: i64,
    pub currency: String,
    pub occurred_at: DateTimeUtc,
    pub settled_at: Option<DateTimeUtc>,
    pub settled_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::trips::Entity",
        from = "Column::TripCode",
        to = "super::trips::Column::Code",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Trips,
    #[sea_orm(has_many = "super::expense_items::Entity")]
    ExpenseItems,
}

impl Related<super::trips::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trips.def()
    }
}

impl Related<super::expense_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(value: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            trip_code: ActiveValue::NotSet,
            payer_id: ActiveValue::Set(value.payer.value()),
            description: ActiveValue::Set(value.description.clone()),
            amount_minor: ActiveValue::Set(value.amount.minor()),
            currency: ActiveValue::Set(value.amount.currency().code().to_string()),
            occurred_at: ActiveValue::Set(value.occurred_at),
            settled_at: ActiveValue::Set(value.settlement.as_ref().map(|s| s.settled_at)),
            settled_by: ActiveValue::Set(value.settlement.as_ref().map(|s| s.settled_by.clone())),
        }
    }
}

impl TryFrom<(Model, Currency, Vec<ExpenseItem>)> for Expense {
    type Error = EngineError;

    fn try_from(
        (model, currency, items): (Model, Currency, Vec<ExpenseItem>),
    ) -> ResultEngine<Self> {
        let settlement = SettlementMark::from_columns(model.settled_at, model.settled_by, "expense")?;
        Ok(Self {
            id: parse_uuid(&model.id, "expense")?,
            payer: MemberId::new(model.payer_id),
            description: model.description,
            amount: Money::new(model.amount_minor, currency),
            occurred_at: model.occurred_at,
            settlement,
            items,
        })
    }
}

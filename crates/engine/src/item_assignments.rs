//! Item assignments: which members consumed an expense item.
//!
//! An assignment without an explicit share takes an equal part of whatever
//! the explicit shares leave of the item amount.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::Serialize;

use crate::{Currency, MemberId, Money};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ItemAssignment {
    pub member: MemberId,
    pub share: Option<Money>,
}

impl ItemAssignment {
    /// Assignment taking an equal part of the item.
    #[must_use]
    pub const fn equal(member: MemberId) -> Self {
        Self {
            member,
            share: None,
        }
    }

    /// Assignment with a fixed share of the item.
    #[must_use]
    pub const fn fixed(member: MemberId, share: Money) -> Self {
        Self {
            member,
            share: Some(share),
        }
    }

    pub(crate) fn from_model(model: &Model, currency: Currency) -> Self {
        Self {
            member: MemberId::new(model.member_id),
            share: model.share_minor.map(|minor| Money::new(minor, currency)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "item_assignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub item_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub member_id: i64,
    pub share_minor: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expense_items::Entity",
        from = "Column::ItemId",
        to = "super::expense_items::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ExpenseItems,
    #[sea_orm(
        belongs_to = "super::members::Entity",
        from = "Column::MemberId",
        to = "super::members::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Members,
}

impl Related<super::expense_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseItems.def()
    }
}

impl Related<super::members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ItemAssignment> for ActiveModel {
    fn from(value: &ItemAssignment) -> Self {
        Self {
            item_id: ActiveValue::NotSet,
            member_id: ActiveValue::Set(value.member.value()),
            share_minor: ActiveValue::Set(value.share.map(Money::minor)),
        }
    }
}

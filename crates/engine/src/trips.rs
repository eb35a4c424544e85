//! A `Trip` is the shared context travelers record expenses under. It is
//! addressed by a short numeric [`TripCode`] people can read out to each other.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, ResultEngine, util::model_currency};

/// Three-digit trip code in `[100, 999]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TripCode(u16);

impl TripCode {
    pub const MIN: i64 = 100;
    pub const MAX: i64 = 999;

    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl TryFrom<i64> for TripCode {
    type Error = EngineError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(EngineError::InvalidTripCode(format!(
                "{value} is not in [{}, {}]",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(value as u16))
    }
}

impl From<TripCode> for i64 {
    fn from(value: TripCode) -> Self {
        i64::from(value.0)
    }
}

impl FromStr for TripCode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(EngineError::InvalidTripCode(format!(
                "\"{trimmed}\" is not a 3-digit code"
            )));
        }
        let value: i64 = trimmed
            .parse()
            .map_err(|_| EngineError::InvalidTripCode(trimmed.to_string()))?;
        TripCode::try_from(value)
    }
}

impl fmt::Display for TripCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trip header: everything but members and expenses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Trip {
    pub code: TripCode,
    pub name: String,
    pub place: Option<String>,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(code: TripCode, name: String, place: Option<String>, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            code,
            name,
            place,
            currency,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "trips")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: i64,
    pub name: String,
    pub place: Option<String>,
    pub currency: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::members::Entity")]
    Members,
    #[sea_orm(has_many = "super::expenses::Entity")]
    Expenses,
}

impl Related<super::members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Trip> for ActiveModel {
    fn from(value: &Trip) -> Self {
        Self {
            code: ActiveValue::Set(i64::from(value.code)),
            name: ActiveValue::Set(value.name.clone()),
            place: ActiveValue::Set(value.place.clone()),
            currency: ActiveValue::Set(value.currency.code().to_string()),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

impl TryFrom<Model> for Trip {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            code: TripCode::try_from(model.code)
                .map_err(|err| EngineError::InconsistentLedger(err.to_string()))?,
            currency: model_currency(&model.currency)?,
            name: model.name,
            place: model.place,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

use std::collections::HashSet;

use chrono::Utc;
use rand::Rng;
use sea_orm::{ActiveValue, QueryFilter, QuerySelect, TransactionTrait, prelude::*};

use crate::{
    Currency, EngineError, Member, ResultEngine, Trip, TripCode, members, trips,
    util::normalize_username,
};

use super::{Engine, normalize_optional_text, normalize_required_name, with_tx};

impl Engine {
    /// Create a trip under a random unused three-digit code.
    pub async fn create_trip(
        &self,
        name: &str,
        place: Option<&str>,
        currency: Currency,
    ) -> ResultEngine<Trip> {
        let name = normalize_required_name(name, "trip")?;
        let place = normalize_optional_text(place);

        with_tx!(self, |db_tx| {
            let used: HashSet<i64> = trips::Entity::find()
                .select_only()
                .column(trips::Column::Code)
                .into_tuple::<i64>()
                .all(&db_tx)
                .await?
                .into_iter()
                .collect();
            let free: Vec<i64> = (TripCode::MIN..=TripCode::MAX)
                .filter(|code| !used.contains(code))
                .collect();
            if free.is_empty() {
                return Err(EngineError::ExistingKey(
                    "every trip code is taken".to_string(),
                ));
            }

            let pick = rand::rng().random_range(0..free.len());
            let code = TripCode::try_from(free[pick])?;
            let trip = Trip::new(code, name, place, currency);
            trips::ActiveModel::from(&trip).insert(&db_tx).await?;

            tracing::debug!(trip = %code, currency = %currency, "trip created");
            Ok(trip)
        })
    }

    pub async fn trip(&self, code: TripCode) -> ResultEngine<Trip> {
        with_tx!(self, |db_tx| {
            let model = self.require_trip(&db_tx, code).await?;
            Trip::try_from(model)
        })
    }

    /// Add an existing user to a trip. A user joins a trip at most once.
    pub async fn add_member(&self, code: TripCode, username: &str) -> ResultEngine<Member> {
        let username = normalize_username(username)?;

        with_tx!(self, |db_tx| {
            self.require_trip(&db_tx, code).await?;
            let user = self.require_user(&db_tx, &username).await?;

            let exists = members::Entity::find()
                .filter(members::Column::TripCode.eq(i64::from(code)))
                .filter(members::Column::Username.eq(username.clone()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(format!(
                    "member {username} in trip {code}"
                )));
            }

            let model = members::ActiveModel {
                id: ActiveValue::NotSet,
                trip_code: ActiveValue::Set(i64::from(code)),
                username: ActiveValue::Set(username.clone()),
                joined_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;
            self.touch_trip(&db_tx, i64::from(code)).await?;

            let member = model.into_member(Some(user));
            tracing::debug!(trip = %code, member = %member.id, %username, "member added");
            Ok(member)
        })
    }

    /// Members of a trip, ordered by member id.
    pub async fn members(&self, code: TripCode) -> ResultEngine<Vec<Member>> {
        with_tx!(self, |db_tx| {
            self.require_trip(&db_tx, code).await?;
            self.load_members(&db_tx, code).await
        })
    }
}

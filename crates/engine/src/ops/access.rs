use chrono::Utc;
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*, sea_query::Expr};

use crate::{EngineError, Member, ResultEngine, TripCode, members, trips, users};

use super::Engine;

impl Engine {
    pub(super) async fn require_trip(
        &self,
        db: &DatabaseTransaction,
        code: TripCode,
    ) -> ResultEngine<trips::Model> {
        trips::Entity::find_by_id(i64::from(code))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("trip {code}")))
    }

    pub(super) async fn require_user(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(username.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("user {username}")))
    }

    /// Membership row of `username` in the trip, or `KeyNotFound`.
    pub(super) async fn require_member(
        &self,
        db: &DatabaseTransaction,
        trip_code: i64,
        username: &str,
    ) -> ResultEngine<members::Model> {
        members::Entity::find()
            .filter(members::Column::TripCode.eq(trip_code))
            .filter(members::Column::Username.eq(username.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| {
                EngineError::KeyNotFound(format!("member {username} in trip {trip_code}"))
            })
    }

    /// Members of a trip joined with their user rows, ordered by member id.
    pub(super) async fn load_members(
        &self,
        db: &DatabaseTransaction,
        code: TripCode,
    ) -> ResultEngine<Vec<Member>> {
        let rows = members::Entity::find()
            .filter(members::Column::TripCode.eq(i64::from(code)))
            .order_by_asc(members::Column::Id)
            .find_also_related(users::Entity)
            .all(db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(member, user)| member.into_member(user))
            .collect())
    }

    /// Bumps `updated_at` of a trip after any write to it.
    pub(super) async fn touch_trip(
        &self,
        db: &DatabaseTransaction,
        trip_code: i64,
    ) -> ResultEngine<()> {
        trips::Entity::update_many()
            .col_expr(trips::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(trips::Column::Code.eq(trip_code))
            .exec(db)
            .await?;
        Ok(())
    }
}

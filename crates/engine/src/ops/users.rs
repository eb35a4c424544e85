use chrono::Utc;
use sea_orm::{TransactionTrait, prelude::*};

use crate::{EngineError, ResultEngine, User, users, util::normalize_username};

use super::{Engine, normalize_optional_text, with_tx};

impl Engine {
    /// Register a user. The username is normalized and must be unused.
    pub async fn create_user(
        &self,
        username: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> ResultEngine<User> {
        let user = User {
            username: normalize_username(username)?,
            display_name: normalize_optional_text(display_name),
            avatar_url: normalize_optional_text(avatar_url),
            created_at: Utc::now(),
        };

        with_tx!(self, |db_tx| {
            let exists = users::Entity::find_by_id(user.username.clone())
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(format!("user {}", user.username)));
            }

            users::ActiveModel::from(&user).insert(&db_tx).await?;
            tracing::debug!(username = %user.username, "user created");
            Ok(user)
        })
    }

    pub async fn user(&self, username: &str) -> ResultEngine<User> {
        let username = normalize_username(username)?;
        with_tx!(self, |db_tx| {
            let model = self.require_user(&db_tx, &username).await?;
            Ok(User::from(model))
        })
    }
}

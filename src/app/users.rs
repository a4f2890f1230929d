use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::media::{MediaService, PROFILE_IMAGE_PREFIX};
use crate::app::validation::{self, FieldErrors, RawProfile};
use crate::domain::user::User;
use crate::infra::db::Db;

pub(crate) const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, phone_number, gender, profile_image_key, created_at";

#[derive(Debug)]
pub enum ProfileOutcome {
    Updated(User),
    Invalid(FieldErrors),
    Missing,
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
    media: MediaService,
    image_max_bytes: usize,
}

impl UserService {
    pub fn new(db: Db, media: MediaService, image_max_bytes: usize) -> Self {
        Self {
            db,
            media,
            image_max_bytes,
        }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut user = user_from_row(&row);
        self.media.populate_user_image_url(&mut user).await;
        Ok(Some(user))
    }

    pub async fn update_profile(&self, user_id: Uuid, raw: RawProfile) -> Result<ProfileOutcome> {
        let update = match validation::validate_profile(raw, self.image_max_bytes) {
            Ok(update) => update,
            Err(errors) => return Ok(ProfileOutcome::Invalid(errors)),
        };

        let image_key = match &update.profile_image {
            Some(image) => Some(self.media.store_image(PROFILE_IMAGE_PREFIX, image).await?),
            None => None,
        };

        let sql = format!(
            "WITH previous AS ( \
                 SELECT id AS previous_id, profile_image_key AS previous_image_key \
                 FROM users WHERE id = $1 FOR UPDATE \
             ) \
             UPDATE users \
             SET first_name = COALESCE($2, first_name), \
                 last_name = COALESCE($3, last_name), \
                 email = COALESCE($4, email), \
                 phone_number = COALESCE($5, phone_number), \
                 gender = COALESCE($6, gender), \
                 profile_image_key = COALESCE($7, profile_image_key) \
             FROM previous \
             WHERE id = previous_id \
             RETURNING {}, previous_image_key",
            USER_COLUMNS
        );
        let updated = sqlx::query(&sql)
            .bind(user_id)
            .bind(update.first_name)
            .bind(update.last_name)
            .bind(update.email)
            .bind(update.phone_number)
            .bind(update.gender.map(|gender| gender.as_db()))
            .bind(&image_key)
            .fetch_optional(self.db.pool())
            .await;

        let row = match updated {
            Ok(row) => row,
            Err(err) => {
                if let Some(key) = &image_key {
                    self.media.discard(key).await;
                }
                return Err(err.into());
            }
        };

        match row {
            Some(row) => {
                let previous: Option<String> = row.get("previous_image_key");
                if let Some(old_key) = replaced_image_key(previous, image_key.as_deref()) {
                    self.media.discard(&old_key).await;
                }
                let mut user = user_from_row(&row);
                self.media.populate_user_image_url(&mut user).await;
                Ok(ProfileOutcome::Updated(user))
            }
            None => {
                if let Some(key) = &image_key {
                    self.media.discard(key).await;
                }
                Ok(ProfileOutcome::Missing)
            }
        }
    }

    /// Deletes the account. Reports and notifications reference users with
    /// RESTRICT foreign keys, so this fails with a foreign key violation while
    /// any exist; refresh tokens cascade.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// The avatar key that a successful update left unreferenced, if any.
fn replaced_image_key(previous: Option<String>, stored: Option<&str>) -> Option<String> {
    let stored = stored?;
    previous.filter(|old| old != stored)
}

pub(crate) fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone_number: row.get("phone_number"),
        gender: row.get("gender"),
        profile_image_key: row.get("profile_image_key"),
        profile_image_url: None,
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_avatar_releases_the_old_one() {
        assert_eq!(
            replaced_image_key(Some("profile_images/old.png".into()), Some("profile_images/new.png")),
            Some("profile_images/old.png".to_string())
        );
    }

    #[test]
    fn nothing_is_released_without_a_new_avatar() {
        assert_eq!(replaced_image_key(Some("profile_images/old.png".into()), None), None);
        assert_eq!(replaced_image_key(None, Some("profile_images/new.png")), None);
        assert_eq!(
            replaced_image_key(Some("profile_images/same.png".into()), Some("profile_images/same.png")),
            None
        );
    }
}

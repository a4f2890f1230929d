use anyhow::{anyhow, Result};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::item::ReportKind;
use crate::domain::notification::{claim_message, Notification};
use crate::infra::db::Db;

#[derive(Debug)]
pub enum ClaimOutcome {
    Notified(Notification),
    ItemNotFound,
    OwnItem,
}

#[derive(Clone)]
pub struct ClaimService {
    db: Db,
}

impl ClaimService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Records a claim on a report by notifying its owner. Every call inserts
    /// a new notification; repeated claims are not collapsed.
    pub async fn claim(
        &self,
        kind: ReportKind,
        item_id: Uuid,
        claimant_id: Uuid,
    ) -> Result<ClaimOutcome> {
        let sql = format!(
            "SELECT user_id, description FROM {} WHERE id = $1",
            kind.table()
        );
        let item = sqlx::query(&sql)
            .bind(item_id)
            .fetch_optional(self.db.pool())
            .await?;

        let Some(item) = item else {
            return Ok(ClaimOutcome::ItemNotFound);
        };
        let owner_id: Uuid = item.get("user_id");
        let description: String = item.get("description");

        if owner_id == claimant_id {
            return Ok(ClaimOutcome::OwnItem);
        }

        let claimant: Option<String> =
            sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
                .bind(claimant_id)
                .fetch_optional(self.db.pool())
                .await?;
        let claimant = claimant.ok_or_else(|| anyhow!("claimant {} does not exist", claimant_id))?;

        let row = sqlx::query(
            "INSERT INTO notifications (to_user_id, from_user_id, message) \
             VALUES ($1, $2, $3) \
             RETURNING id, to_user_id, from_user_id, message, is_read, created_at",
        )
        .bind(owner_id)
        .bind(claimant_id)
        .bind(claim_message(&claimant, &description))
        .fetch_one(self.db.pool())
        .await?;

        let notification = Notification {
            id: row.get("id"),
            to_user_id: row.get("to_user_id"),
            from_user_id: row.get("from_user_id"),
            message: row.get("message"),
            is_read: row.get("is_read"),
            created_at: row.get("created_at"),
        };

        tracing::info!(
            notification_id = %notification.id,
            item_id = %item_id,
            kind = kind.as_str(),
            claimant_id = %claimant_id,
            "item claimed"
        );

        Ok(ClaimOutcome::Notified(notification))
    }
}

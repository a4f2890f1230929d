use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub to_user_id: Uuid,
    pub from_user_id: Uuid,
    pub message: String,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Message sent to the reporter when `claimant` claims their item.
pub fn claim_message(claimant: &str, item_description: &str) -> String {
    format!(
        "{} has claimed the item you found: {}",
        claimant, item_description
    )
}

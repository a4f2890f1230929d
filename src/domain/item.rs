use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Which side of the lost-and-found desk a report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Lost,
    Found,
}

impl ReportKind {
    pub fn from_path(value: &str) -> Option<Self> {
        match value {
            "lost" => Some(Self::Lost),
            "found" => Some(Self::Found),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lost => "lost",
            Self::Found => "found",
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            Self::Lost => "lost_items",
            Self::Found => "found_items",
        }
    }

    pub fn image_prefix(&self) -> &'static str {
        match self {
            Self::Lost => "lost_item_images",
            Self::Found => "found_item_images",
        }
    }

    pub fn location_label(&self) -> &'static str {
        match self {
            Self::Lost => "Last Seen Location",
            Self::Found => "Found Location",
        }
    }

    pub fn location_help(&self) -> &'static str {
        match self {
            Self::Lost => "Where did you last see the item?",
            Self::Found => "Where did you find the item?",
        }
    }

    pub fn location_placeholder(&self) -> &'static str {
        match self {
            Self::Lost => "Enter last seen location",
            Self::Found => "Enter found location",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Electronics,
    Clothing,
    Accessories,
    Documents,
    Bags,
    Jewelry,
    Keys,
    Wallet,
    Phone,
    Laptop,
    Books,
    Sports,
    Pet,
    Other,
}

impl ItemType {
    pub const ALL: [ItemType; 14] = [
        Self::Electronics,
        Self::Clothing,
        Self::Accessories,
        Self::Documents,
        Self::Bags,
        Self::Jewelry,
        Self::Keys,
        Self::Wallet,
        Self::Phone,
        Self::Laptop,
        Self::Books,
        Self::Sports,
        Self::Pet,
        Self::Other,
    ];

    pub fn from_db(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|item_type| item_type.as_db() == value)
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Electronics => "electronics",
            Self::Clothing => "clothing",
            Self::Accessories => "accessories",
            Self::Documents => "documents",
            Self::Bags => "bags",
            Self::Jewelry => "jewelry",
            Self::Keys => "keys",
            Self::Wallet => "wallet",
            Self::Phone => "phone",
            Self::Laptop => "laptop",
            Self::Books => "books",
            Self::Sports => "sports",
            Self::Pet => "pet",
            Self::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Electronics => "Electronics",
            Self::Clothing => "Clothing",
            Self::Accessories => "Accessories",
            Self::Documents => "Documents",
            Self::Bags => "Bags & Luggage",
            Self::Jewelry => "Jewelry",
            Self::Keys => "Keys",
            Self::Wallet => "Wallet/Purse",
            Self::Phone => "Mobile Phone",
            Self::Laptop => "Laptop/Tablet",
            Self::Books => "Books/Notebooks",
            Self::Sports => "Sports Equipment",
            Self::Pet => "Pet",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    pub id: Uuid,
    pub kind: ReportKind,
    pub user_id: Uuid,
    pub item_name: String,
    pub item_type: ItemType,
    pub color: String,
    pub brand: Option<String>,
    pub description: String,
    pub distinctive_features: String,
    pub location: String,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    #[serde(skip_serializing)]
    pub image_key: Option<String>,
    #[serde(skip_deserializing)]
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

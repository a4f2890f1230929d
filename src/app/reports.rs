use anyhow::{anyhow, Result};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::media::MediaService;
use crate::app::validation::{self, FieldErrors, RawReport, ReportInput};
use crate::domain::item::{ItemReport, ItemType, ReportKind};
use crate::infra::db::Db;

const REPORT_COLUMNS: &str = "id, user_id, item_name, item_type, color, brand, description, \
     distinctive_features, location, contact_name, contact_email, contact_phone, image_key, created_at";

pub const DUPLICATE_WARNING: &str =
    "A similar item has been reported recently. Please check existing reports before submitting.";

/// How far back the duplicate check looks for similar lost reports.
const DUPLICATE_WINDOW_DAYS: i32 = 7;

#[derive(Debug, Serialize)]
pub struct SubmittedReport {
    #[serde(flatten)]
    pub report: ItemReport,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Created(SubmittedReport),
    Invalid(FieldErrors),
}

#[derive(Debug, Default, Clone)]
pub struct SearchFilters {
    pub query: Option<String>,
    pub location: Option<String>,
    pub item_type: Option<ItemType>,
    pub kind: Option<ReportKind>,
}

#[derive(Debug, Serialize)]
pub struct ItemListing {
    pub lost_items: Vec<ItemReport>,
    pub found_items: Vec<ItemReport>,
}

#[derive(Clone)]
pub struct ReportService {
    db: Db,
    media: MediaService,
    image_max_bytes: usize,
}

impl ReportService {
    pub fn new(db: Db, media: MediaService, image_max_bytes: usize) -> Self {
        Self {
            db,
            media,
            image_max_bytes,
        }
    }

    pub async fn submit_lost(&self, user_id: Uuid, raw: RawReport) -> Result<SubmitOutcome> {
        self.validate_and_submit(ReportKind::Lost, user_id, raw).await
    }

    pub async fn submit_found(&self, user_id: Uuid, raw: RawReport) -> Result<SubmitOutcome> {
        self.validate_and_submit(ReportKind::Found, user_id, raw).await
    }

    async fn validate_and_submit(
        &self,
        kind: ReportKind,
        user_id: Uuid,
        raw: RawReport,
    ) -> Result<SubmitOutcome> {
        let input = match validation::validate_report(kind, raw, self.image_max_bytes) {
            Ok(input) => input,
            Err(errors) => return Ok(SubmitOutcome::Invalid(errors)),
        };

        let mut warnings = Vec::new();
        match kind {
            ReportKind::Lost => {
                if self.has_recent_similar(&input.item_name, &input.location).await? {
                    warnings.push(DUPLICATE_WARNING.to_string());
                }
            }
            ReportKind::Found => {
                let matches = self
                    .count_potential_matches(&input.item_name, &input.color)
                    .await?;
                if matches > 0 {
                    tracing::debug!(
                        user_id = %user_id,
                        matches = matches,
                        "found report resembles existing lost reports"
                    );
                }
            }
        }

        let mut report = self.insert(user_id, input).await?;
        if report.image_key.is_some() {
            self.media
                .populate_report_image_urls(std::slice::from_mut(&mut report))
                .await;
        }

        tracing::info!(
            report_id = %report.id,
            kind = kind.as_str(),
            user_id = %user_id,
            "item report submitted"
        );

        Ok(SubmitOutcome::Created(SubmittedReport { report, warnings }))
    }

    async fn insert(&self, user_id: Uuid, input: ReportInput) -> Result<ItemReport> {
        let kind = input.kind;
        let image_key = match &input.image {
            Some(image) => Some(self.media.store_image(kind.image_prefix(), image).await?),
            None => None,
        };

        let sql = format!(
            "INSERT INTO {} (user_id, item_name, item_type, color, brand, description, \
             distinctive_features, location, contact_name, contact_email, contact_phone, image_key) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {}",
            kind.table(),
            REPORT_COLUMNS
        );
        let inserted = sqlx::query(&sql)
            .bind(user_id)
            .bind(&input.item_name)
            .bind(input.item_type.as_db())
            .bind(&input.color)
            .bind(&input.brand)
            .bind(&input.description)
            .bind(&input.distinctive_features)
            .bind(&input.location)
            .bind(&input.contact_name)
            .bind(&input.contact_email)
            .bind(&input.contact_phone)
            .bind(&image_key)
            .fetch_one(self.db.pool())
            .await;

        match inserted {
            Ok(row) => report_from_row(kind, &row),
            Err(err) => {
                if let Some(key) = &image_key {
                    self.media.discard(key).await;
                }
                Err(err.into())
            }
        }
    }

    /// True when a lost report with a containing name and location was filed
    /// in the last week.
    pub async fn has_recent_similar(&self, item_name: &str, location: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS( \
                 SELECT 1 FROM lost_items \
                 WHERE strpos(lower(item_name), lower($1)) > 0 \
                   AND strpos(lower(location), lower($2)) > 0 \
                   AND created_at >= now() - make_interval(days => $3) \
             )",
        )
        .bind(item_name)
        .bind(location)
        .bind(DUPLICATE_WINDOW_DAYS)
        .fetch_one(self.db.pool())
        .await?;

        Ok(exists)
    }

    /// Number of lost reports a found item might belong to: containing name,
    /// same color ignoring case.
    pub async fn count_potential_matches(&self, item_name: &str, color: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lost_items \
             WHERE strpos(lower(item_name), lower($1)) > 0 \
               AND lower(color) = lower($2)",
        )
        .bind(item_name)
        .bind(color)
        .fetch_one(self.db.pool())
        .await?;

        Ok(count)
    }

    pub async fn get(&self, kind: ReportKind, id: Uuid) -> Result<Option<ItemReport>> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", REPORT_COLUMNS, kind.table());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut report = report_from_row(kind, &row)?;
        self.media
            .populate_report_image_urls(std::slice::from_mut(&mut report))
            .await;
        Ok(Some(report))
    }

    /// Every lost and found report matching `filters`, newest first. With no
    /// filters this is the full listing.
    pub async fn list(&self, filters: &SearchFilters) -> Result<ItemListing> {
        let lost_items = match filters.kind {
            Some(ReportKind::Found) => Vec::new(),
            _ => self.search_kind(ReportKind::Lost, filters, None).await?,
        };
        let found_items = match filters.kind {
            Some(ReportKind::Lost) => Vec::new(),
            _ => self.search_kind(ReportKind::Found, filters, None).await?,
        };
        self.with_image_urls(lost_items, found_items).await
    }

    /// The `limit` newest reports of each kind.
    pub async fn recent(&self, limit: i64) -> Result<ItemListing> {
        let filters = SearchFilters::default();
        let lost_items = self
            .search_kind(ReportKind::Lost, &filters, Some(limit))
            .await?;
        let found_items = self
            .search_kind(ReportKind::Found, &filters, Some(limit))
            .await?;
        self.with_image_urls(lost_items, found_items).await
    }

    async fn with_image_urls(
        &self,
        mut lost_items: Vec<ItemReport>,
        mut found_items: Vec<ItemReport>,
    ) -> Result<ItemListing> {
        self.media.populate_report_image_urls(&mut lost_items).await;
        self.media.populate_report_image_urls(&mut found_items).await;
        Ok(ItemListing {
            lost_items,
            found_items,
        })
    }

    async fn search_kind(
        &self,
        kind: ReportKind,
        filters: &SearchFilters,
        limit: Option<i64>,
    ) -> Result<Vec<ItemReport>> {
        let sql = format!(
            "SELECT {} FROM {} \
             WHERE ($1::text IS NULL \
                    OR strpos(lower(item_name), lower($1)) > 0 \
                    OR strpos(lower(color), lower($1)) > 0 \
                    OR strpos(lower(description), lower($1)) > 0) \
               AND ($2::text IS NULL OR strpos(lower(location), lower($2)) > 0) \
               AND ($3::text IS NULL OR item_type = $3) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $4",
            REPORT_COLUMNS,
            kind.table()
        );
        let rows = sqlx::query(&sql)
            .bind(filters.query.as_deref())
            .bind(filters.location.as_deref())
            .bind(filters.item_type.map(|item_type| item_type.as_db()))
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(|row| report_from_row(kind, row)).collect()
    }
}

pub(crate) fn report_from_row(kind: ReportKind, row: &PgRow) -> Result<ItemReport> {
    let item_type: String = row.get("item_type");
    let item_type = ItemType::from_db(&item_type)
        .ok_or_else(|| anyhow!("unknown item_type in {}: {}", kind.table(), item_type))?;

    Ok(ItemReport {
        id: row.get("id"),
        kind,
        user_id: row.get("user_id"),
        item_name: row.get("item_name"),
        item_type,
        color: row.get("color"),
        brand: row.get("brand"),
        description: row.get("description"),
        distinctive_features: row.get("distinctive_features"),
        location: row.get("location"),
        contact_name: row.get("contact_name"),
        contact_email: row.get("contact_email"),
        contact_phone: row.get("contact_phone"),
        image_key: row.get("image_key"),
        image_url: None,
        created_at: row.get("created_at"),
    })
}

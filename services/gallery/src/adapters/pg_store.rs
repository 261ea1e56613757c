//! services/gallery/src/adapters/pg_store.rs
//!
//! This module contains the PostgreSQL adapter, the concrete implementation
//! of the `PhotoStore` port for deployments with a database. It handles all
//! interactions with PostgreSQL using `sqlx`; live feeds are driven by
//! `LISTEN/NOTIFY` on the `photos_changed` channel.

use async_stream::stream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lecture_gallery_core::domain::{NewPhoto, PhotoFilter, PhotoRecord};
use lecture_gallery_core::ports::{PhotoFeed, PhotoStore, PortError, PortResult};
use sqlx::postgres::PgListener;
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

const CHANGE_CHANNEL: &str = "photos_changed";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `PhotoStore` port.
#[derive(Clone)]
pub struct PgPhotoStore {
    pool: PgPool,
    max_record_bytes: usize,
}

impl PgPhotoStore {
    /// Creates a new `PgPhotoStore`.
    pub fn new(pool: PgPool, max_record_bytes: usize) -> Self {
        Self {
            pool,
            max_record_bytes,
        }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct PhotoRow {
    id: Uuid,
    subject: String,
    owner_id: String,
    image_data: String,
    created_at: DateTime<Utc>,
}
impl PhotoRow {
    fn to_domain(self) -> PhotoRecord {
        PhotoRecord {
            id: self.id,
            subject: self.subject,
            owner_id: self.owner_id,
            image_data: self.image_data,
            created_at: self.created_at,
        }
    }
}

async fn fetch_matching(pool: &PgPool, filter: &PhotoFilter) -> PortResult<Vec<PhotoRecord>> {
    let rows = sqlx::query_as::<_, PhotoRow>(
        "SELECT id, subject, owner_id, image_data, created_at FROM photos \
         WHERE subject = $1 AND ($2::text IS NULL OR owner_id = $2) \
         ORDER BY created_at ASC, id ASC",
    )
    .bind(&filter.subject)
    .bind(filter.owner_id.as_deref())
    .fetch_all(pool)
    .await
    .map_err(|e| PortError::StoreReadError(e.to_string()))?;

    Ok(rows.into_iter().map(|r| r.to_domain()).collect())
}

//=========================================================================================
// `PhotoStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl PhotoStore for PgPhotoStore {
    async fn insert_photo(&self, photo: NewPhoto) -> PortResult<PhotoRecord> {
        if photo.subject.trim().is_empty() || photo.owner_id.trim().is_empty() {
            return Err(PortError::StoreWriteError(
                "subject and owner are required".to_string(),
            ));
        }
        if photo.image_data.len() > self.max_record_bytes {
            return Err(PortError::StoreWriteError(format!(
                "record of {} bytes exceeds the {} byte limit",
                photo.image_data.len(),
                self.max_record_bytes
            )));
        }

        let inserted = sqlx::query_as::<_, PhotoRow>(
            "INSERT INTO photos (id, request_id, subject, owner_id, image_data) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (request_id) DO NOTHING \
             RETURNING id, subject, owner_id, image_data, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(photo.request_id)
        .bind(&photo.subject)
        .bind(&photo.owner_id)
        .bind(&photo.image_data)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::StoreWriteError(e.to_string()))?;

        if let Some(row) = inserted {
            return Ok(row.to_domain());
        }

        // The request id was seen before: hand back the original record.
        let existing = sqlx::query_as::<_, PhotoRow>(
            "SELECT id, subject, owner_id, image_data, created_at FROM photos \
             WHERE request_id = $1",
        )
        .bind(photo.request_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::StoreWriteError(e.to_string()))?;
        if existing.subject != photo.subject || existing.owner_id != photo.owner_id {
            return Err(PortError::StoreWriteError(format!(
                "request {} was already used for a different record",
                photo.request_id
            )));
        }
        Ok(existing.to_domain())
    }

    async fn find_photos(&self, filter: &PhotoFilter) -> PortResult<Vec<PhotoRecord>> {
        fetch_matching(&self.pool, filter).await
    }

    async fn watch_photos(&self, filter: &PhotoFilter) -> PortResult<PhotoFeed> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| PortError::StoreReadError(e.to_string()))?;
        listener
            .listen(CHANGE_CHANNEL)
            .await
            .map_err(|e| PortError::StoreReadError(e.to_string()))?;
        info!("Listening on '{}' for subject '{}'.", CHANGE_CHANNEL, filter.subject);

        let pool = self.pool.clone();
        let filter = filter.clone();
        let initial = fetch_matching(&pool, &filter).await?;

        let feed = stream! {
            let mut last = initial;
            yield Ok(last.clone());
            loop {
                let received = listener.try_recv().await;
                let refetch = match &received {
                    Ok(Some(notification)) => notification.payload() == filter.subject,
                    // The connection dropped and was re-established; changes may have been missed.
                    Ok(None) => {
                        warn!("Notification connection was reset; refetching.");
                        true
                    }
                    Err(_) => false,
                };
                if let Err(e) = received {
                    yield Err(PortError::StoreReadError(e.to_string()));
                    break;
                }
                if !refetch {
                    continue;
                }
                match fetch_matching(&pool, &filter).await {
                    Ok(next) if next != last => {
                        last = next.clone();
                        yield Ok(next);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(e);
                    }
                }
            }
        };
        Ok(Box::pin(feed))
    }

    async fn delete_photo(&self, photo_id: Uuid, owner_id: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM photos WHERE id = $1 AND owner_id = $2")
            .bind(photo_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::StoreWriteError(e.to_string()))?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM photos WHERE id = $1)",
        )
        .bind(photo_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::StoreWriteError(e.to_string()))?;
        if exists {
            Err(PortError::StoreWriteError(format!(
                "permission denied: photo {} belongs to another user",
                photo_id
            )))
        } else {
            Err(PortError::StoreWriteError(format!("photo {} not found", photo_id)))
        }
    }
}

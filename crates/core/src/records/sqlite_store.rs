//! SQLite-backed record store implementation.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{JobFilter, RenditionStore, StoreError};
use super::types::{
    JobTransition, NewRendition, NewSource, PublishJob, PublishStatus, Rendition, Source,
    Visibility,
};
use crate::media::{Orientation, TransformProfile};

const SOURCE_COLUMNS: &str =
    "id, user_id, original_filename, storage_path, duration_secs, width, height, fps, created_at";
const RENDITION_COLUMNS: &str = "id, source_id, orientation, transform_profile, storage_path, duration_secs, width, height, fps, content_sha256, created_at";
const JOB_COLUMNS: &str = "id, rendition_id, user_id, remote_id, remote_url, title, visibility, thumbnail_applied, status, error_text, published_at, created_at, updated_at";

/// SQLite-backed store for sources, renditions and publish jobs.
pub struct SqliteRenditionStore {
    conn: Mutex<Connection>,
}

impl SqliteRenditionStore {
    /// Create a new SQLite store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                storage_path TEXT NOT NULL,
                duration_secs REAL NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                fps REAL NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS renditions (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL REFERENCES sources(id),
                orientation TEXT NOT NULL,
                transform_profile TEXT,
                storage_path TEXT NOT NULL,
                duration_secs REAL NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                fps REAL NOT NULL,
                content_sha256 TEXT,
                created_at TEXT NOT NULL
            );

            -- rendition_id has no foreign key: failed orientation chains
            -- reference a rendition id that was never persisted.
            CREATE TABLE IF NOT EXISTS publish_jobs (
                id TEXT PRIMARY KEY,
                rendition_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                remote_id TEXT,
                remote_url TEXT,
                title TEXT NOT NULL,
                visibility TEXT NOT NULL,
                thumbnail_applied INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                error_text TEXT,
                published_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sources_user ON sources(user_id);
            CREATE INDEX IF NOT EXISTS idx_renditions_source ON renditions(source_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_rendition ON publish_jobs(rendition_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_user ON publish_jobs(user_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON publish_jobs(status);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_source(row: &rusqlite::Row) -> rusqlite::Result<Source> {
        let storage_path: String = row.get(3)?;
        let created_at_str: String = row.get(8)?;
        Ok(Source {
            id: row.get(0)?,
            user_id: row.get(1)?,
            original_filename: row.get(2)?,
            storage_path: PathBuf::from(storage_path),
            duration_secs: row.get(4)?,
            width: row.get(5)?,
            height: row.get(6)?,
            fps: row.get(7)?,
            created_at: parse_timestamp(&created_at_str),
        })
    }

    fn row_to_rendition(row: &rusqlite::Row) -> rusqlite::Result<Rendition> {
        let orientation_str: String = row.get(2)?;
        let profile_json: Option<String> = row.get(3)?;
        let storage_path: String = row.get(4)?;
        let created_at_str: String = row.get(10)?;

        let orientation = orientation_str
            .parse::<Orientation>()
            .map_err(|e| text_conversion_error(2, e))?;
        let transform_profile = profile_json
            .map(|json| serde_json::from_str::<TransformProfile>(&json))
            .transpose()
            .map_err(|e| text_conversion_error(3, e))?;

        Ok(Rendition {
            id: row.get(0)?,
            source_id: row.get(1)?,
            orientation,
            transform_profile,
            storage_path: PathBuf::from(storage_path),
            duration_secs: row.get(5)?,
            width: row.get(6)?,
            height: row.get(7)?,
            fps: row.get(8)?,
            content_sha256: row.get(9)?,
            created_at: parse_timestamp(&created_at_str),
        })
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<PublishJob> {
        let visibility_str: String = row.get(6)?;
        let status_str: String = row.get(8)?;
        let published_at_str: Option<String> = row.get(10)?;
        let created_at_str: String = row.get(11)?;
        let updated_at_str: String = row.get(12)?;

        Ok(PublishJob {
            id: row.get(0)?,
            rendition_id: row.get(1)?,
            user_id: row.get(2)?,
            remote_id: row.get(3)?,
            remote_url: row.get(4)?,
            title: row.get(5)?,
            visibility: visibility_str
                .parse::<Visibility>()
                .map_err(|e| text_conversion_error(6, e))?,
            thumbnail_applied: row.get(7)?,
            status: status_str
                .parse::<PublishStatus>()
                .map_err(|e| text_conversion_error(8, e))?,
            error_text: row.get(9)?,
            published_at: published_at_str.as_deref().map(parse_timestamp),
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }

    fn fetch_job(conn: &Connection, id: &str) -> Result<Option<PublishJob>, StoreError> {
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM publish_jobs WHERE id = ?", JOB_COLUMNS),
                params![id],
                Self::row_to_job,
            )
            .optional()?)
    }

    fn insert_job(conn: &Connection, job: &PublishJob) -> Result<(), StoreError> {
        conn.execute(
            &format!(
                "INSERT INTO publish_jobs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                JOB_COLUMNS
            ),
            params![
                job.id,
                job.rendition_id,
                job.user_id,
                job.remote_id,
                job.remote_url,
                job.title,
                job.visibility.as_str(),
                job.thumbnail_applied,
                job.status.as_str(),
                job.error_text,
                job.published_at.map(|t| t.to_rfc3339()),
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref user_id) = filter.user_id {
            conditions.push("user_id = ?");
            params.push(Box::new(user_id.clone()));
        }

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref rendition_id) = filter.rendition_id {
            conditions.push("rendition_id = ?");
            params.push(Box::new(rendition_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

impl RenditionStore for SqliteRenditionStore {
    fn create_source(&self, source: NewSource) -> Result<Source, StoreError> {
        let conn = self.conn()?;
        let now = Utc::now();

        conn.execute(
            &format!(
                "INSERT INTO sources ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                SOURCE_COLUMNS
            ),
            params![
                source.id,
                source.user_id,
                source.original_filename,
                source.storage_path.to_string_lossy(),
                source.metrics.duration_secs,
                source.metrics.width,
                source.metrics.height,
                source.metrics.fps,
                now.to_rfc3339(),
            ],
        )?;

        Ok(Source {
            id: source.id,
            user_id: source.user_id,
            original_filename: source.original_filename,
            storage_path: source.storage_path,
            duration_secs: source.metrics.duration_secs,
            width: source.metrics.width,
            height: source.metrics.height,
            fps: source.metrics.fps,
            created_at: now,
        })
    }

    fn get_source(&self, id: &str) -> Result<Option<Source>, StoreError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM sources WHERE id = ?", SOURCE_COLUMNS),
                params![id],
                Self::row_to_source,
            )
            .optional()?)
    }

    fn create_rendition(&self, rendition: NewRendition) -> Result<Rendition, StoreError> {
        let conn = self.conn()?;
        let now = Utc::now();

        let profile_json = rendition
            .transform_profile
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            &format!(
                "INSERT INTO renditions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                RENDITION_COLUMNS
            ),
            params![
                rendition.id,
                rendition.source_id,
                rendition.orientation.as_str(),
                profile_json,
                rendition.storage_path.to_string_lossy(),
                rendition.metrics.duration_secs,
                rendition.metrics.width,
                rendition.metrics.height,
                rendition.metrics.fps,
                rendition.content_sha256,
                now.to_rfc3339(),
            ],
        )?;

        Ok(Rendition {
            id: rendition.id,
            source_id: rendition.source_id,
            orientation: rendition.orientation,
            transform_profile: rendition.transform_profile,
            storage_path: rendition.storage_path,
            duration_secs: rendition.metrics.duration_secs,
            width: rendition.metrics.width,
            height: rendition.metrics.height,
            fps: rendition.metrics.fps,
            content_sha256: rendition.content_sha256,
            created_at: now,
        })
    }

    fn get_rendition(&self, id: &str) -> Result<Option<Rendition>, StoreError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM renditions WHERE id = ?", RENDITION_COLUMNS),
                params![id],
                Self::row_to_rendition,
            )
            .optional()?)
    }

    fn list_renditions(&self, source_id: &str) -> Result<Vec<Rendition>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM renditions WHERE source_id = ? ORDER BY created_at ASC, rowid ASC",
            RENDITION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![source_id], Self::row_to_rendition)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn create_publish_job(
        &self,
        rendition_id: &str,
        user_id: &str,
        title: &str,
        visibility: Visibility,
    ) -> Result<PublishJob, StoreError> {
        let conn = self.conn()?;
        let now = Utc::now();
        let job = PublishJob {
            id: uuid::Uuid::new_v4().to_string(),
            rendition_id: rendition_id.to_string(),
            user_id: user_id.to_string(),
            remote_id: None,
            remote_url: None,
            title: title.to_string(),
            visibility,
            thumbnail_applied: false,
            status: PublishStatus::Queued,
            error_text: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        };
        Self::insert_job(&conn, &job)?;
        Ok(job)
    }

    fn create_failed_job(
        &self,
        rendition_id: &str,
        user_id: &str,
        title: &str,
        error: &str,
    ) -> Result<PublishJob, StoreError> {
        let conn = self.conn()?;
        let now = Utc::now();
        let job = PublishJob {
            id: uuid::Uuid::new_v4().to_string(),
            rendition_id: rendition_id.to_string(),
            user_id: user_id.to_string(),
            remote_id: None,
            remote_url: None,
            title: title.to_string(),
            visibility: Visibility::default(),
            thumbnail_applied: false,
            status: PublishStatus::Error,
            error_text: Some(error.to_string()),
            published_at: None,
            created_at: now,
            updated_at: now,
        };
        Self::insert_job(&conn, &job)?;
        Ok(job)
    }

    fn get_publish_job(&self, id: &str) -> Result<Option<PublishJob>, StoreError> {
        let conn = self.conn()?;
        Self::fetch_job(&conn, id)
    }

    fn latest_job_for_rendition(
        &self,
        rendition_id: &str,
    ) -> Result<Option<PublishJob>, StoreError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM publish_jobs WHERE rendition_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    JOB_COLUMNS
                ),
                params![rendition_id],
                Self::row_to_job,
            )
            .optional()?)
    }

    fn list_publish_jobs(&self, filter: &JobFilter) -> Result<Vec<PublishJob>, StoreError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM publish_jobs {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            JOB_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt.query_map(param_refs.as_slice(), Self::row_to_job)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn transition_job(
        &self,
        id: &str,
        transition: JobTransition,
    ) -> Result<PublishJob, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut job =
            Self::fetch_job(&tx, id)?.ok_or_else(|| StoreError::not_found("publish job", id))?;
        let target = transition
            .target(job.status)
            .ok_or_else(|| StoreError::InvalidTransition {
                job_id: id.to_string(),
                from: job.status,
                transition: transition.name(),
            })?;

        let now = Utc::now();
        job.status = target;
        job.updated_at = now;
        match transition {
            JobTransition::Start | JobTransition::Retry => {
                job.error_text = None;
                job.remote_id = None;
                job.remote_url = None;
                job.published_at = None;
            }
            JobTransition::Succeed {
                remote_id,
                remote_url,
            } => {
                job.remote_id = Some(remote_id);
                job.remote_url = Some(remote_url);
                job.error_text = None;
                job.published_at = Some(now);
            }
            JobTransition::Fail { error } => {
                job.remote_id = None;
                job.remote_url = None;
                job.error_text = Some(error);
                job.published_at = None;
            }
        }

        tx.execute(
            "UPDATE publish_jobs SET status = ?, remote_id = ?, remote_url = ?, error_text = ?, published_at = ?, updated_at = ? WHERE id = ?",
            params![
                job.status.as_str(),
                job.remote_id,
                job.remote_url,
                job.error_text,
                job.published_at.map(|t| t.to_rfc3339()),
                job.updated_at.to_rfc3339(),
                job.id,
            ],
        )?;
        tx.commit()?;

        Ok(job)
    }
}

/// A TEXT column that holds a value the domain type rejects.
fn text_conversion_error(
    column: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, e.into())
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{migrate::MigrateError, sqlite::SqlitePoolOptions, Row, SqlitePool};
use thiserror::Error;

use strata_core::types::{AggregateStats, DatasetPage, DatasetRecord, ListQuery};
use strata_core::{PipelineError, Repository};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle that loads single datasets by id.
    pub fn datasets(&self) -> DatasetRepository {
        DatasetRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle that loads paged dataset listings.
    pub fn dataset_pages(&self) -> DatasetPageRepository {
        DatasetPageRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle that computes aggregate figures per category.
    pub fn aggregates(&self) -> AggregateRepository {
        AggregateRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for connectivity probes.
    pub fn probes(&self) -> ProbeRepository {
        ProbeRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn repository_fault(err: sqlx::Error) -> PipelineError {
    PipelineError::repository(format!("database error: {err}"))
}

/// Raw dataset row as stored in SQLite.
#[derive(Debug, sqlx::FromRow)]
struct DatasetRow {
    id: i64,
    name: String,
    description: String,
    category: String,
    value: f64,
    score: f64,
    active: i64,
    created_at: DateTime<Utc>,
}

impl DatasetRow {
    fn into_domain(self) -> DatasetRecord {
        DatasetRecord {
            id: self.id,
            name: self.name,
            description: self.description,
            category: self.category,
            value: self.value,
            score: self.score,
            active: self.active != 0,
            created_at: self.created_at,
        }
    }
}

const DATASET_COLUMNS: &str = "id, name, description, category, value, score, active, created_at";

/// Loads a single dataset row by primary key.
#[derive(Clone)]
pub struct DatasetRepository {
    pool: SqlitePool,
}

#[async_trait]
impl Repository for DatasetRepository {
    type Input = i64;
    type Output = Option<DatasetRecord>;

    async fn validate_input(&self, input: &i64) -> Result<(), PipelineError> {
        if *input < 1 {
            return Err(PipelineError::validation(
                "dataset id must be a positive integer",
            ));
        }
        Ok(())
    }

    async fn provide(&self, input: i64) -> Result<Option<DatasetRecord>, PipelineError> {
        let row = sqlx::query_as::<_, DatasetRow>(&format!(
            "SELECT {DATASET_COLUMNS} FROM datasets WHERE id = ?"
        ))
        .bind(input)
        .fetch_optional(&self.pool)
        .await
        .map_err(repository_fault)?;

        Ok(row.map(DatasetRow::into_domain))
    }
}

/// Loads one page of dataset rows together with the pre-paging row count.
#[derive(Clone)]
pub struct DatasetPageRepository {
    pool: SqlitePool,
}

#[async_trait]
impl Repository for DatasetPageRepository {
    type Input = ListQuery;
    type Output = DatasetPage;

    async fn validate_input(&self, input: &ListQuery) -> Result<(), PipelineError> {
        if input.skip < 0 {
            return Err(PipelineError::validation("skip must be non-negative"));
        }
        if !(1..=1000).contains(&input.limit) {
            return Err(PipelineError::validation("limit must be between 1 and 1000"));
        }
        Ok(())
    }

    async fn provide(&self, input: ListQuery) -> Result<DatasetPage, PipelineError> {
        let (total, rows) = match input.category.as_deref() {
            Some(category) => {
                let total_row =
                    sqlx::query("SELECT COUNT(*) AS total FROM datasets WHERE category = ?")
                        .bind(category)
                        .fetch_one(&self.pool)
                        .await
                        .map_err(repository_fault)?;
                let rows = sqlx::query_as::<_, DatasetRow>(&format!(
                    "SELECT {DATASET_COLUMNS} FROM datasets \
                     WHERE category = ? ORDER BY id LIMIT ? OFFSET ?"
                ))
                .bind(category)
                .bind(input.limit)
                .bind(input.skip)
                .fetch_all(&self.pool)
                .await
                .map_err(repository_fault)?;
                (total_row.get::<i64, _>("total"), rows)
            }
            None => {
                let total_row = sqlx::query("SELECT COUNT(*) AS total FROM datasets")
                    .fetch_one(&self.pool)
                    .await
                    .map_err(repository_fault)?;
                let rows = sqlx::query_as::<_, DatasetRow>(&format!(
                    "SELECT {DATASET_COLUMNS} FROM datasets ORDER BY id LIMIT ? OFFSET ?"
                ))
                .bind(input.limit)
                .bind(input.skip)
                .fetch_all(&self.pool)
                .await
                .map_err(repository_fault)?;
                (total_row.get::<i64, _>("total"), rows)
            }
        };

        Ok(DatasetPage {
            records: rows.into_iter().map(DatasetRow::into_domain).collect(),
            total,
        })
    }
}

/// Computes aggregate value statistics, optionally narrowed to one category.
#[derive(Clone)]
pub struct AggregateRepository {
    pool: SqlitePool,
}

#[async_trait]
impl Repository for AggregateRepository {
    type Input = Option<String>;
    type Output = AggregateStats;

    async fn provide(&self, input: Option<String>) -> Result<AggregateStats, PipelineError> {
        const COLUMNS: &str = "COUNT(*) AS item_count, \
             COALESCE(AVG(value), 0.0) AS avg_value, \
             COALESCE(MIN(value), 0.0) AS min_value, \
             COALESCE(MAX(value), 0.0) AS max_value";

        let row = match input.as_deref() {
            Some(category) => {
                sqlx::query(&format!(
                    "SELECT {COLUMNS} FROM datasets WHERE category = ?"
                ))
                .bind(category)
                .fetch_one(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!("SELECT {COLUMNS} FROM datasets"))
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(repository_fault)?;

        Ok(AggregateStats {
            count: row.get("item_count"),
            avg_value: row.get("avg_value"),
            min_value: row.get("min_value"),
            max_value: row.get("max_value"),
        })
    }
}

/// Repository recording and reading connectivity probes.
#[derive(Clone)]
pub struct ProbeRepository {
    pool: SqlitePool,
}

impl ProbeRepository {
    /// Writes a probe row proving the write path works.
    pub async fn record(&self, message: &str, at: DateTime<Utc>) -> Result<(), ProbeError> {
        sqlx::query("INSERT INTO connection_probes (message, created_at) VALUES (?, ?)")
            .bind(message)
            .bind(to_rfc3339(at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Reads the most recently written probe row back.
    pub async fn latest(&self) -> Result<Option<ProbeRecord>, ProbeError> {
        let row = sqlx::query_as::<_, ProbeRecord>(
            "SELECT message, created_at FROM connection_probes \
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

/// Probe row loaded back from the database.
#[derive(Debug, sqlx::FromRow)]
pub struct ProbeRecord {
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Errors that can occur while recording or reading probes.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::ErrorKind;

    async fn setup_db() -> Database {
        let db = Database::connect("sqlite::memory:?cache=shared")
            .await
            .expect("connect");
        db.run_migrations().await.expect("migrations");
        db
    }

    #[tokio::test]
    async fn migrations_apply() {
        let db = setup_db().await;

        let tables: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('datasets', 'connection_probes')",
        )
        .fetch_one(db.pool())
        .await
        .expect("fetch tables");
        assert_eq!(tables.0, 2);
    }

    #[tokio::test]
    async fn file_backed_database_migrates_and_seeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("strata.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());

        let db = Database::connect(&url).await.expect("connect");
        db.run_migrations().await.expect("migrations");

        let record = db.datasets().fetch(1).await.expect("fetch");
        assert!(record.is_some());
    }

    #[tokio::test]
    async fn seeded_dataset_loads_with_expected_figures() {
        let db = setup_db().await;
        let record = db
            .datasets()
            .fetch(1)
            .await
            .expect("fetch dataset")
            .expect("dataset 1 is seeded");

        assert_eq!(record.name, "Sample Data 1");
        assert_eq!(record.category, "example");
        assert_eq!(record.value, 42.5);
        assert_eq!(record.score, 0.85);
        assert!(record.active);
    }

    #[tokio::test]
    async fn missing_dataset_reads_as_none() {
        let db = setup_db().await;
        let record = db.datasets().fetch(999).await.expect("fetch dataset");
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn non_positive_dataset_id_is_rejected() {
        let db = setup_db().await;
        let error = db.datasets().fetch(0).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn page_counts_rows_before_slicing() {
        let db = setup_db().await;
        let page = db
            .dataset_pages()
            .fetch(ListQuery {
                skip: 0,
                limit: 2,
                category: None,
            })
            .await
            .expect("fetch page");

        assert_eq!(page.total, 3);
        let ids: Vec<i64> = page.records.iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn page_honours_the_category_filter() {
        let db = setup_db().await;
        let page = db
            .dataset_pages()
            .fetch(ListQuery {
                skip: 0,
                limit: 100,
                category: Some("example".to_string()),
            })
            .await
            .expect("fetch page");

        assert_eq!(page.total, 2);
        assert!(page
            .records
            .iter()
            .all(|record| record.category == "example"));
    }

    #[tokio::test]
    async fn oversized_limit_is_rejected() {
        let db = setup_db().await;
        let error = db
            .dataset_pages()
            .fetch(ListQuery {
                skip: 0,
                limit: 1001,
                category: None,
            })
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn aggregate_covers_the_matching_rows() {
        let db = setup_db().await;
        let stats = db
            .aggregates()
            .fetch(Some("example".to_string()))
            .await
            .expect("fetch stats");

        assert_eq!(stats.count, 2);
        assert_eq!(stats.avg_value, 30.625);
        assert_eq!(stats.min_value, 18.75);
        assert_eq!(stats.max_value, 42.5);
    }

    #[tokio::test]
    async fn aggregate_defaults_to_zero_for_an_empty_category() {
        let db = setup_db().await;
        let stats = db
            .aggregates()
            .fetch(Some("missing".to_string()))
            .await
            .expect("fetch stats");

        assert_eq!(stats.count, 0);
        assert_eq!(stats.avg_value, 0.0);
    }

    #[tokio::test]
    async fn probe_round_trip_returns_the_latest_message() {
        let db = setup_db().await;
        let probes = db.probes();
        probes
            .record("reachability check", Utc::now())
            .await
            .expect("record probe");

        let latest = probes
            .latest()
            .await
            .expect("read probe")
            .expect("probe row present");
        assert_eq!(latest.message, "reachability check");
    }
}

/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::migrate::Migrator;
use sqlx::{Any, AnyPool, Connection, Executor, Row};

use metrix_types::{BackoffPolicy, MetricCollection, MetricKind, MetricRecord, MetricValue};

use crate::{BatchUpsertError, ConnectError, MetricStore, StoreError};

mod classify;
pub use classify::is_transient;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const UPSERT_SQL: &str = "\
INSERT INTO metrics (id, type, delta, value) VALUES ($1, $2, $3, $4) \
ON CONFLICT (id) DO UPDATE SET \
type = excluded.type, \
delta = COALESCE(metrics.delta, 0) + excluded.delta, \
value = excluded.value \
RETURNING id, type, delta, value";

const SELECT_ONE_SQL: &str = "SELECT id, type, delta, value FROM metrics WHERE id = $1";
const SELECT_ALL_SQL: &str = "SELECT id, type, delta, value FROM metrics";

#[derive(Clone, Debug)]
pub struct SqlStoreConfig {
    pub dsn: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub retry: BackoffPolicy,
}

impl SqlStoreConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        SqlStoreConfig {
            dsn: dsn.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            retry: BackoffPolicy::default(),
        }
    }
}

pub struct SqlStore {
    pool: AnyPool,
}

impl SqlStore {
    /// Open the pool, retrying transient failures by `config.retry`.
    pub async fn connect(config: &SqlStoreConfig) -> Result<Self, ConnectError> {
        sqlx::any::install_default_drivers();

        let mut attempt = 0usize;
        loop {
            let r = AnyPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(config.acquire_timeout)
                .connect(&config.dsn)
                .await;
            match r {
                Ok(pool) => {
                    debug!("database connected after {} attempts", attempt + 1);
                    return Ok(SqlStore { pool });
                }
                Err(e) if is_transient(&e) => match config.retry.delay(attempt) {
                    Some(delay) => {
                        warn!("database connect attempt {} failed: {e}, retry in {delay:?}", attempt + 1);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        return Err(ConnectError::Exhausted {
                            attempts: attempt + 1,
                            source: e,
                        });
                    }
                },
                Err(e) => return Err(ConnectError::Fatal(e)),
            }
        }
    }

    pub fn from_pool(pool: AnyPool) -> Self {
        SqlStore { pool }
    }

    /// Apply pending schema migrations. Nothing pending is success.
    pub async fn migrate(&self) -> Result<(), ConnectError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn record_from_row(row: &AnyRow) -> Result<MetricRecord, StoreError> {
    let id: String = row.try_get("id")?;
    let kind: String = row.try_get("type")?;
    let delta: Option<i64> = row.try_get("delta")?;
    let value: Option<f64> = row.try_get("value")?;

    let corrupt = |reason: String| StoreError::CorruptRow {
        id: id.clone(),
        reason,
    };
    let kind = MetricKind::from_str(&kind).map_err(|e| corrupt(e.to_string()))?;
    let value = match kind {
        MetricKind::Gauge => value.map(MetricValue::Gauge),
        MetricKind::Counter => delta.map(MetricValue::Counter),
    };
    let value = value.ok_or_else(|| corrupt(format!("no {kind} value")))?;
    Ok(MetricRecord::new(id, value))
}

async fn upsert_one<'e, E>(executor: E, record: &MetricRecord) -> Result<MetricRecord, StoreError>
where
    E: Executor<'e, Database = Any>,
{
    let row = sqlx::query(UPSERT_SQL)
        .bind(record.name())
        .bind(record.kind().as_str())
        .bind(record.counter_value())
        .bind(record.gauge_value())
        .fetch_one(executor)
        .await?;
    record_from_row(&row)
}

#[async_trait]
impl MetricStore for SqlStore {
    async fn get_metric(&self, name: &str) -> Result<MetricRecord, StoreError> {
        let row = sqlx::query(SELECT_ONE_SQL)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => record_from_row(&row),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }

    async fn set_metric(&self, record: &MetricRecord) -> Result<MetricRecord, StoreError> {
        upsert_one(&self.pool, record).await
    }

    async fn upsert_batch(
        &self,
        batch: MetricCollection,
    ) -> Result<MetricCollection, BatchUpsertError> {
        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                return Err(BatchUpsertError {
                    original: batch,
                    source: e.into(),
                });
            }
        };

        let mut stored = MetricCollection::with_capacity(batch.len());
        for record in batch.iter() {
            match upsert_one(&mut *tx, record).await {
                Ok(r) => stored.push(r),
                Err(e) => {
                    if let Err(re) = tx.rollback().await {
                        warn!("failed to rollback batch upsert: {re}");
                    }
                    return Err(BatchUpsertError {
                        original: batch,
                        source: e,
                    });
                }
            }
        }

        match tx.commit().await {
            Ok(_) => Ok(stored),
            Err(e) => Err(BatchUpsertError {
                original: batch,
                source: e.into(),
            }),
        }
    }

    async fn records(&self) -> Result<Vec<MetricRecord>, StoreError> {
        let rows = sqlx::query(SELECT_ALL_SQL).fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn ping(&self) -> bool {
        match self.pool.acquire().await {
            Ok(mut conn) => conn.ping().await.is_ok(),
            Err(e) => {
                debug!("database ping failed: {e}");
                false
            }
        }
    }
}

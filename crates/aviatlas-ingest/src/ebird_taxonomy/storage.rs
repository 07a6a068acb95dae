//! Storage backends for taxonomy records
//!
//! The loader only needs two things from storage: a cheap existence check
//! for the destination table, and a bulk insert that hands back one
//! identifier per record in submission order.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::TaxonomyRecord;
use crate::config::IngestConfig;

/// Table-oriented persistence for taxonomy records
#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    /// Human-readable backend name for logs
    fn backend(&self) -> &str;

    /// Confirm the destination table is reachable
    async fn check_table(&self) -> Result<()> {
        Ok(())
    }

    /// Insert a batch and return the assigned identifiers in the same order
    async fn insert_batch(&self, records: &[TaxonomyRecord]) -> Result<Vec<Uuid>>;
}

#[derive(Debug, Deserialize)]
struct InsertedRow {
    id: Uuid,
}

/// Client for a PostgREST table endpoint (Supabase)
#[derive(Debug, Clone)]
pub struct RestTaxonomyStore {
    client: Client,
    base_url: String,
    service_role_key: String,
    table: String,
}

impl RestTaxonomyStore {
    pub fn new(
        base_url: impl Into<String>,
        service_role_key: impl Into<String>,
        table: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_role_key: service_role_key.into(),
            table: table.into(),
        })
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        let (url, key) = config.rest_credentials()?;
        Self::new(url, key, config.table.clone(), config.http_timeout())
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
    }

    async fn error_for_status(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(anyhow!("{} failed: {} - {}", action, status, body))
    }
}

#[async_trait]
impl TaxonomyStore for RestTaxonomyStore {
    fn backend(&self) -> &str {
        "rest"
    }

    async fn check_table(&self) -> Result<()> {
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await
            .with_context(|| format!("Failed to reach table '{}'", self.table))?;

        Self::error_for_status(response, &format!("Access check for table '{}'", self.table)).await?;
        info!(table = %self.table, "Destination table is accessible");
        Ok(())
    }

    async fn insert_batch(&self, records: &[TaxonomyRecord]) -> Result<Vec<Uuid>> {
        debug!(table = %self.table, count = records.len(), "Inserting batch");

        let response = self
            .authorized(self.client.post(self.table_url()))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(records)
            .send()
            .await
            .with_context(|| format!("Failed to send insert to '{}'", self.table))?;

        let response = Self::error_for_status(response, &format!("Insert into '{}'", self.table)).await?;
        let rows: Vec<InsertedRow> = response
            .json()
            .await
            .context("Failed to decode inserted rows")?;

        Ok(rows.into_iter().map(|row| row.id).collect())
    }
}

#[cfg(feature = "database")]
pub use postgres::PgTaxonomyStore;

#[cfg(feature = "database")]
mod postgres {
    use super::*;
    use crate::config::is_identifier;
    use sqlx::postgres::PgPoolOptions;
    use sqlx::{PgPool, Postgres, QueryBuilder};

    /// Direct Postgres backend
    ///
    /// Identifiers are generated client-side so one multi-row `INSERT`
    /// returns them in submission order without relying on `RETURNING` order.
    #[derive(Debug, Clone)]
    pub struct PgTaxonomyStore {
        pool: PgPool,
        table: String,
    }

    impl PgTaxonomyStore {
        pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self> {
            let table = table.into();
            if !is_identifier(&table) {
                anyhow::bail!("Invalid table name: '{}'", table);
            }
            Ok(Self { pool, table })
        }

        pub async fn connect(config: &IngestConfig) -> Result<Self> {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow!("DATABASE_URL not set"))?;
            let pool = PgPoolOptions::new()
                .max_connections(2)
                .acquire_timeout(config.http_timeout())
                .connect(url)
                .await
                .context("Failed to connect to database")?;
            Self::new(pool, config.table.clone())
        }
    }

    #[async_trait]
    impl TaxonomyStore for PgTaxonomyStore {
        fn backend(&self) -> &str {
            "postgres"
        }

        async fn check_table(&self) -> Result<()> {
            sqlx::query(&format!("SELECT id FROM {} LIMIT 1", self.table))
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Cannot access table '{}'", self.table))?;
            info!(table = %self.table, "Destination table is accessible");
            Ok(())
        }

        async fn insert_batch(&self, records: &[TaxonomyRecord]) -> Result<Vec<Uuid>> {
            if records.is_empty() {
                return Ok(Vec::new());
            }

            let mut ids = Vec::with_capacity(records.len());
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                r#"
                INSERT INTO {} (
                    id, name, rank, parent_id, scientific_name, common_name,
                    ebird_code, order_name, family_name, species_group,
                    created_at, updated_at
                )
                "#,
                self.table
            ));

            query_builder.push_values(records.iter(), |mut b, record| {
                let id = Uuid::new_v4();
                ids.push(id);

                b.push_bind(id)
                    .push_bind(&record.name)
                    .push_bind(record.rank.as_str())
                    .push_bind(record.parent_id)
                    .push_bind(&record.scientific_name)
                    .push_bind(&record.common_name)
                    .push_bind(&record.ebird_code)
                    .push_bind(&record.order_name)
                    .push_bind(&record.family_name)
                    .push_bind(&record.species_group)
                    .push_bind(record.created_at)
                    .push_bind(record.updated_at);
            });

            query_builder
                .build()
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to insert into '{}'", self.table))?;

            debug!(table = %self.table, count = ids.len(), "Inserted batch");
            Ok(ids)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let store =
            RestTaxonomyStore::new("https://example.supabase.co/", "key", "bird_taxonomy", Duration::from_secs(5))
                .unwrap();
        assert_eq!(store.table_url(), "https://example.supabase.co/rest/v1/bird_taxonomy");
        assert_eq!(store.backend(), "rest");
    }

    #[test]
    fn test_from_config_requires_credentials() {
        assert!(RestTaxonomyStore::from_config(&IngestConfig::new()).is_err());

        let config = IngestConfig::new().with_supabase("https://example.supabase.co", "key");
        assert!(RestTaxonomyStore::from_config(&config).is_ok());
    }
}

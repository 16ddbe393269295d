//! Garment catalog storage.
//!
//! [`CatalogStore`] abstracts the two operations the pipeline needs: list
//! rows still missing attributes, and write a finished [`AttributeRecord`]
//! back. [`SupabaseStore`] implements it over the PostgREST API; tests use
//! [`InMemoryStore`].

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

use crate::attrs::AttributeRecord;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("missing credential: {0}")]
    MissingCredentials(String),

    #[error("catalog request failed: {0}")]
    Http(String),

    #[error("catalog returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("catalog response decode error: {0}")]
    Decode(String),
}

// ============================================================================
// Store Trait
// ============================================================================

/// A catalog row whose attributes have not been generated yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingItem {
    pub id: String,
    /// Absent when the row was inserted without an image.
    pub image_url: Option<String>,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Rows in `table` with a null `attributes` column.
    async fn pending_items(&self, table: &str) -> Result<Vec<PendingItem>, StoreError>;

    /// Write `attributes` onto the row with the given id.
    async fn save_attributes(
        &self,
        table: &str,
        id: &str,
        attributes: &AttributeRecord,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// Supabase Store
// ============================================================================

/// [`CatalogStore`] over a Supabase project's PostgREST endpoint.
pub struct SupabaseStore {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SupabaseStore {
    /// Build a store from the standard Supabase environment variables.
    ///
    /// The service-role key is preferred because it bypasses row-level
    /// security; the publishable and anon keys are accepted as fallbacks
    /// for read-mostly local runs.
    pub fn from_env() -> Result<Self, StoreError> {
        let base_url = std::env::var("NEXT_PUBLIC_SUPABASE_URL")
            .map_err(|_| StoreError::MissingCredentials("NEXT_PUBLIC_SUPABASE_URL".to_string()))?;
        let api_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|_| std::env::var("NEXT_PUBLIC_SUPABASE_PUBLISHABLE_KEY"))
            .or_else(|_| std::env::var("NEXT_PUBLIC_SUPABASE_ANON_KEY"))
            .map_err(|_| {
                StoreError::MissingCredentials(
                    "SUPABASE_SERVICE_ROLE_KEY (or a publishable/anon key)".to_string(),
                )
            })?;
        Ok(Self::new(base_url, api_key))
    }

    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }
}

#[async_trait]
impl CatalogStore for SupabaseStore {
    async fn pending_items(&self, table: &str) -> Result<Vec<PendingItem>, StoreError> {
        let response = self
            .client
            .get(self.rest_url(table))
            .query(&[("select", "id,image_url"), ("attributes", "is.null")])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(rows.into_iter().filter_map(pending_from_row).collect())
    }

    async fn save_attributes(
        &self,
        table: &str,
        id: &str,
        attributes: &AttributeRecord,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .patch(self.rest_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .header("apikey", &self.api_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(&self.api_key)
            .json(&json!({ "attributes": attributes }))
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Convert one PostgREST row into a [`PendingItem`].
///
/// Ids may arrive as strings or numbers depending on the column type; rows
/// without a usable id are dropped.
fn pending_from_row(row: Value) -> Option<PendingItem> {
    let id = match row.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let image_url = row
        .get("image_url")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    Some(PendingItem { id, image_url })
}

// ============================================================================
// In-Memory Store (test support)
// ============================================================================

#[cfg(test)]
pub struct InMemoryStore {
    pending: std::sync::Mutex<std::collections::HashMap<String, Vec<PendingItem>>>,
    pub saved: std::sync::Mutex<Vec<(String, String, AttributeRecord)>>,
}

#[cfg(test)]
impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            pending: std::sync::Mutex::new(std::collections::HashMap::new()),
            saved: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_pending(self, table: &str, items: Vec<PendingItem>) -> Self {
        self.pending
            .lock()
            .unwrap()
            .insert(table.to_string(), items);
        self
    }
}

#[cfg(test)]
#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn pending_items(&self, table: &str) -> Result<Vec<PendingItem>, StoreError> {
        Ok(self
            .pending
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_attributes(
        &self,
        table: &str,
        id: &str,
        attributes: &AttributeRecord,
    ) -> Result<(), StoreError> {
        self.saved
            .lock()
            .unwrap()
            .push((table.to_string(), id.to_string(), attributes.clone()));
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

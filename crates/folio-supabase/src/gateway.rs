//! `RemoteCollection` over PostgREST

use async_trait::async_trait;
use folio_api::{fields_to_json, ApiError, Fields, RowId, POSITION_COLUMN};
use folio_core::{OrderedEntity, RemoteCollection, Result};
use serde::Deserialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::{decode, SupabaseClient};

#[derive(Deserialize)]
struct PositionRow {
    sort_order: i64,
}

/// One remote table of a Supabase project.
pub struct SupabaseCollection<T> {
    client: Arc<SupabaseClient>,
    table: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T: OrderedEntity> SupabaseCollection<T> {
    pub fn new(client: Arc<SupabaseClient>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            _entity: PhantomData,
        }
    }

    fn list_url(&self) -> String {
        self.client.table_url(
            &self.table,
            &format!("select=*&order={}.asc", POSITION_COLUMN),
        )
    }

    fn max_position_url(&self) -> String {
        self.client.table_url(
            &self.table,
            &format!(
                "select={col}&order={col}.desc&limit=1",
                col = POSITION_COLUMN
            ),
        )
    }

    fn row_url(&self, id: RowId) -> String {
        self.client.table_url(&self.table, &format!("id=eq.{}", id))
    }

    fn label(&self, op: &str, id: Option<RowId>) -> String {
        match id {
            Some(id) => format!("{} {}/{}", op, T::COLLECTION, id),
            None => format!("{} {}", op, T::COLLECTION),
        }
    }

    /// Writes return the affected rows; none means the id did not exist.
    fn expect_affected(&self, operation: &str, id: RowId, body: &str) -> Result<()> {
        let rows: Vec<serde_json::Value> = decode(operation, body)?;
        if rows.is_empty() {
            warn!(operation, "no row matched");
            return Err(ApiError::NotFound {
                collection: T::COLLECTION,
                id,
            });
        }
        Ok(())
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<T: OrderedEntity> RemoteCollection<T> for SupabaseCollection<T> {
    async fn list(&self) -> Result<Vec<T>> {
        let operation = self.label("list", None);
        let body = self.client.get(&operation, &self.list_url()).await?;
        let rows: Vec<T> = decode(&operation, &body)?;
        debug!(table = %self.table, count = rows.len(), "listed rows");
        Ok(rows)
    }

    async fn max_position(&self) -> Result<Option<i64>> {
        let operation = self.label("max_position", None);
        let body = self.client.get(&operation, &self.max_position_url()).await?;
        let rows: Vec<PositionRow> = decode(&operation, &body)?;
        Ok(rows.first().map(|row| row.sort_order))
    }

    async fn insert_row(&self, fields: Fields) -> Result<T> {
        let operation = self.label("insert", None);
        let url = self.client.table_url(&self.table, "");
        let body = self
            .client
            .post(&operation, &url, &fields_to_json(fields))
            .await?;

        let mut rows: Vec<T> = decode(&operation, &body)?;
        if rows.is_empty() {
            return Err(ApiError::backend(operation, "insert returned no row"));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, id: RowId, fields: Fields) -> Result<()> {
        let operation = self.label("update", Some(id));
        let body = self
            .client
            .patch(&operation, &self.row_url(id), &fields_to_json(fields))
            .await?;
        self.expect_affected(&operation, id, &body)
    }

    async fn delete(&self, id: RowId) -> Result<()> {
        let operation = self.label("delete", Some(id));
        let body = self.client.delete(&operation, &self.row_url(id)).await?;
        self.expect_affected(&operation, id, &body)
    }
}

//! In-memory implementation of `RemoteCollection`
//!
//! A lightweight, non-persistent row store useful for:
//! - Unit and property-based testing of the store without a network
//! - Offline work with the CLI (`--memory`)
//! - Reference behaviour for the HTTP gateway
//!
//! Besides holding rows it records every call and can inject failures, delays
//! and a hold gate, so tests can observe writes while they are in flight.

use async_trait::async_trait;
use folio_api::{fields_to_json, ApiError, Fields, RowId, Value};
use folio_core::{OrderedEntity, RemoteCollection, Result};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Gateway operation kinds, used for call logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    List,
    MaxPosition,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for GatewayOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GatewayOp::List => "list",
            GatewayOp::MaxPosition => "max_position",
            GatewayOp::Insert => "insert",
            GatewayOp::Update => "update",
            GatewayOp::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCall {
    pub op: GatewayOp,
    pub id: Option<RowId>,
    pub fields: Option<Fields>,
}

#[derive(Debug, Default)]
struct Faults {
    /// Fail this many upcoming calls, whatever their kind
    fail_next: usize,
    failing_ops: HashSet<GatewayOp>,
    /// Updates and deletes targeting these rows fail
    failing_rows: HashSet<RowId>,
    delay: Option<Duration>,
}

#[derive(Debug)]
struct MemoryState<T> {
    rows: Vec<T>,
    /// Counter for deterministic id assignment
    next_id: RowId,
    faults: Faults,
    calls: Vec<GatewayCall>,
}

/// In-memory row store for one collection.
#[derive(Debug)]
pub struct MemoryCollection<T> {
    state: Mutex<MemoryState<T>>,
    /// `true` while calls may proceed
    gate: watch::Sender<bool>,
}

impl<T: OrderedEntity> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: OrderedEntity> MemoryCollection<T> {
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    /// Seed the store with existing rows. New ids continue after the largest seeded id.
    pub fn with_rows(rows: Vec<T>) -> Self {
        let next_id = rows.iter().map(|r| r.id()).max().map_or(1, |max| max + 1);
        let (gate, _) = watch::channel(true);
        Self {
            state: Mutex::new(MemoryState {
                rows,
                next_id,
                faults: Faults::default(),
                calls: Vec::new(),
            }),
            gate,
        }
    }

    /// Current rows in position order, without recording a call.
    pub async fn rows(&self) -> Vec<T> {
        let state = self.state.lock().await;
        sorted(&state.rows)
    }

    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Fail the next `count` calls of any kind.
    pub async fn fail_next(&self, count: usize) {
        self.state.lock().await.faults.fail_next = count;
    }

    /// Fail every call of the given kind until faults are cleared.
    pub async fn fail_op(&self, op: GatewayOp) {
        self.state.lock().await.faults.failing_ops.insert(op);
    }

    /// Fail updates and deletes targeting `id` until faults are cleared.
    pub async fn fail_writes_for(&self, id: RowId) {
        self.state.lock().await.faults.failing_rows.insert(id);
    }

    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().await.faults.delay = delay;
    }

    pub async fn clear_faults(&self) {
        self.state.lock().await.faults = Faults::default();
    }

    /// Hold every subsequent call after it has been recorded, until `release`.
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    fn label(op: GatewayOp, id: Option<RowId>) -> String {
        match id {
            Some(id) => format!("{} {}/{}", op, T::COLLECTION, id),
            None => format!("{} {}", op, T::COLLECTION),
        }
    }

    /// Record the call, wait for the gate and any delay, then apply injected faults.
    async fn enter(&self, op: GatewayOp, id: Option<RowId>, fields: Option<&Fields>) -> Result<()> {
        let delay = {
            let mut state = self.state.lock().await;
            state.calls.push(GatewayCall {
                op,
                id,
                fields: fields.cloned(),
            });
            state.faults.delay
        };

        let mut gate = self.gate.subscribe();
        // Errors only when the sender is dropped, and `self` owns it
        let _ = gate.wait_for(|open| *open).await;

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        let faults = &mut state.faults;
        let injected = if faults.fail_next > 0 {
            faults.fail_next -= 1;
            true
        } else {
            faults.failing_ops.contains(&op)
                || (matches!(op, GatewayOp::Update | GatewayOp::Delete)
                    && id.is_some_and(|id| faults.failing_rows.contains(&id)))
        };

        if injected {
            tracing::debug!(%op, collection = %T::COLLECTION, ?id, "injecting failure");
            return Err(ApiError::backend(Self::label(op, id), "injected failure"));
        }
        Ok(())
    }
}

fn sorted<T: OrderedEntity>(rows: &[T]) -> Vec<T> {
    let mut rows = rows.to_vec();
    rows.sort_by_key(|r| (r.position(), r.id()));
    rows
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<T: OrderedEntity> RemoteCollection<T> for MemoryCollection<T> {
    async fn list(&self) -> Result<Vec<T>> {
        self.enter(GatewayOp::List, None, None).await?;
        Ok(self.rows().await)
    }

    async fn max_position(&self) -> Result<Option<i64>> {
        self.enter(GatewayOp::MaxPosition, None, None).await?;
        let state = self.state.lock().await;
        Ok(state.rows.iter().map(|r| r.position()).max())
    }

    async fn insert_row(&self, fields: Fields) -> Result<T> {
        self.enter(GatewayOp::Insert, None, Some(&fields)).await?;

        let mut state = self.state.lock().await;
        let id = state.next_id;
        let mut row = fields;
        row.insert("id".to_string(), Value::Integer(id));

        let entity: T = serde_json::from_value(fields_to_json(row)).map_err(|e| {
            ApiError::backend(
                Self::label(GatewayOp::Insert, None),
                format!("invalid row: {}", e),
            )
        })?;

        state.next_id += 1;
        state.rows.push(entity.clone());
        Ok(entity)
    }

    async fn update(&self, id: RowId, fields: Fields) -> Result<()> {
        self.enter(GatewayOp::Update, Some(id), Some(&fields)).await?;

        let mut state = self.state.lock().await;
        let row = state
            .rows
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(ApiError::NotFound {
                collection: T::COLLECTION,
                id,
            })?;

        *row = row.with_fields(&fields).map_err(|e| {
            ApiError::backend(Self::label(GatewayOp::Update, Some(id)), e.to_string())
        })?;
        Ok(())
    }

    async fn delete(&self, id: RowId) -> Result<()> {
        self.enter(GatewayOp::Delete, Some(id), None).await?;

        let mut state = self.state.lock().await;
        let index = state
            .rows
            .iter()
            .position(|r| r.id() == id)
            .ok_or(ApiError::NotFound {
                collection: T::COLLECTION,
                id,
            })?;
        state.rows.remove(index);
        Ok(())
    }
}

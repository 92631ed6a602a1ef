//! Ordered collection store
//!
//! Client-side owner of one collection's sequence. It renders mutations
//! optimistically where the UI benefits (edit, remove, reorder), confirms them
//! through the gateway, and restores the pre-operation snapshot when the remote
//! call fails.
//!
//! State lives in a `tokio::sync::watch` channel: every transition is published
//! to subscribers, and readers never hold a lock across a gateway call.

use folio_api::{ApiError, CollectionKind, Fields, RowId, Value};
use folio_core::{
    check_patch, plan_move_by_id, plan_reorder, OrderedEntity, RemoteCollection, ReorderPlan,
    Result,
};
use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::state::{CollectionState, LoadPhase, ReorderPhase, StoreEvent, StorePhase};
use crate::config::StoreConfig;

const EVENT_BUFFER: usize = 256;

/// Releases a create/edit/remove slot when the operation ends, however it ends.
struct MutationGuard<'a, T> {
    state: &'a watch::Sender<CollectionState<T>>,
}

impl<T> Drop for MutationGuard<'_, T> {
    fn drop(&mut self) {
        self.state.send_modify(|s| {
            s.mutations_in_flight = s.mutations_in_flight.saturating_sub(1);
        });
    }
}

/// Clears the pending-reorder flag, unless a load already replaced it.
struct ReorderGuard<'a, T> {
    state: &'a watch::Sender<CollectionState<T>>,
    token: u64,
}

impl<T> Drop for ReorderGuard<'_, T> {
    fn drop(&mut self) {
        let token = self.token;
        self.state.send_if_modified(|s| {
            if s.pending_reorder != Some(token) {
                return false;
            }
            s.pending_reorder = None;
            s.reorder = ReorderPhase::Idle;
            true
        });
    }
}

/// Stateful orchestrator for one ordered collection.
///
/// # Example
///
/// ```rust,no_run
/// use folio::{MemoryCollection, OrderedCollectionStore, Skill, StoreConfig};
/// use std::sync::Arc;
///
/// async fn example() -> Result<(), folio::ApiError> {
///     let gateway = Arc::new(MemoryCollection::<Skill>::new());
///     let store = OrderedCollectionStore::new(gateway, StoreConfig::default());
///
///     store.load().await?;
///     store.reorder(0, 2).await?;
///     println!("{:?}", store.items());
///     Ok(())
/// }
/// ```
pub struct OrderedCollectionStore<T: OrderedEntity> {
    gateway: Arc<dyn RemoteCollection<T>>,
    config: StoreConfig,
    state: watch::Sender<CollectionState<T>>,
    events: broadcast::Sender<StoreEvent>,
    next_token: AtomicU64,
}

impl<T: OrderedEntity> OrderedCollectionStore<T> {
    pub fn new(gateway: Arc<dyn RemoteCollection<T>>, config: StoreConfig) -> Self {
        let (state, _) = watch::channel(CollectionState::default());
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            gateway,
            config,
            state,
            events,
            next_token: AtomicU64::new(1),
        }
    }

    pub fn kind(&self) -> CollectionKind {
        T::COLLECTION
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current sequence, in display order
    pub fn items(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn phase(&self) -> StorePhase {
        self.state.borrow().phase()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.borrow().last_error.clone()
    }

    pub fn snapshot(&self) -> CollectionState<T> {
        self.state.borrow().clone()
    }

    /// Watch the full state; the receiver sees the latest snapshot after every transition.
    pub fn subscribe(&self) -> watch::Receiver<CollectionState<T>> {
        self.state.subscribe()
    }

    /// Event stream for observers that need every transition, not just the latest state.
    pub fn events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Replace the sequence with a fresh listing.
    ///
    /// On failure the previous sequence stays untouched. A successful load is
    /// authoritative: it clears any pending-reorder flag, and settlements of
    /// operations that started before it no longer touch the sequence. Such an
    /// operation re-lists once it is confirmed, since the listing may predate it.
    /// Create, edit, remove and reorder are rejected while a load is in flight.
    pub async fn load(&self) -> Result<()> {
        let mut seq = 0;
        self.state.send_modify(|s| {
            s.load_seq += 1;
            seq = s.load_seq;
            s.load = LoadPhase::Loading;
        });

        let label = format!("list {}", T::COLLECTION);
        match self.call(&label, self.gateway.list()).await {
            Ok(mut rows) => {
                rows.sort_by_key(|r| (r.position(), r.id()));
                let count = rows.len();
                let applied = self.state.send_if_modified(|s| {
                    if s.load_seq != seq {
                        return false;
                    }
                    s.items = rows;
                    s.epoch += 1;
                    s.load = LoadPhase::Idle;
                    s.reorder = ReorderPhase::Idle;
                    s.pending_reorder = None;
                    s.last_error = None;
                    true
                });

                if applied {
                    info!(collection = %T::COLLECTION, count, "collection loaded");
                    self.emit(StoreEvent::Loaded {
                        collection: T::COLLECTION,
                        count,
                    });
                } else {
                    debug!(collection = %T::COLLECTION, "load superseded by a newer load");
                }
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.state.send_modify(|s| {
                    if s.load_seq == seq {
                        s.load = LoadPhase::LoadError;
                    }
                    s.last_error = Some(message.clone());
                });
                self.emit(StoreEvent::Failed {
                    collection: T::COLLECTION,
                    operation: "load".to_string(),
                    message,
                });
                Err(err)
            }
        }
    }

    /// Create a row at the end of the collection.
    ///
    /// Not optimistic: the row appears only once the store has assigned its id
    /// and position.
    pub async fn create(&self, fields: Fields) -> Result<T> {
        let operation = "create";
        check_patch(&fields).map_err(|e| self.reject(operation, e))?;
        let (guard, epoch) = self.begin_mutation(operation)?;

        let label = format!("insert {}", T::COLLECTION);
        let row = match self.call(&label, self.gateway.insert(fields)).await {
            Ok(row) => row,
            Err(err) => {
                drop(guard);
                return Err(self.fail(operation, err));
            }
        };

        let id = row.id();
        self.state.send_modify(|s| {
            if s.epoch == epoch && !s.items.iter().any(|r| r.id() == id) {
                s.items.push(row.clone());
            }
            s.last_error = None;
        });
        info!(collection = %T::COLLECTION, id, position = row.position(), "row created");
        self.emit(StoreEvent::Created {
            collection: T::COLLECTION,
            id,
        });

        self.refresh(epoch).await;
        drop(guard);
        Ok(row)
    }

    /// Apply a field patch optimistically, reverting it if the update fails.
    pub async fn edit(&self, id: RowId, fields: Fields) -> Result<()> {
        let operation = "edit";
        check_patch(&fields).map_err(|e| self.reject(operation, e))?;
        let (guard, epoch) = self.begin_mutation(operation)?;

        let mut applied: Result<T> = Err(ApiError::NotFound {
            collection: T::COLLECTION,
            id,
        });
        self.state.send_if_modified(|s| {
            let Some(slot) = s.items.iter_mut().find(|r| r.id() == id) else {
                return false;
            };
            match slot.patched(&fields) {
                Ok(updated) => {
                    applied = Ok(std::mem::replace(slot, updated));
                    true
                }
                Err(err) => {
                    applied = Err(err);
                    false
                }
            }
        });
        let previous = match applied {
            Ok(previous) => previous,
            Err(err) => {
                drop(guard);
                return Err(self.reject(operation, err));
            }
        };

        let mut remote = fields;
        if T::TRACKS_UPDATED_AT {
            remote.insert(
                "updated_at".to_string(),
                Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }

        let label = format!("update {}/{}", T::COLLECTION, id);
        if let Err(err) = self.call(&label, self.gateway.update(id, remote)).await {
            let message = err.to_string();
            self.state.send_modify(|s| {
                if s.epoch == epoch {
                    if let Some(slot) = s.items.iter_mut().find(|r| r.id() == id) {
                        *slot = previous;
                    }
                }
                s.last_error = Some(message.clone());
            });
            self.rolled_back(operation, message);
            return Err(err);
        }

        self.state.send_modify(|s| s.last_error = None);
        info!(collection = %T::COLLECTION, id, "row edited");
        self.emit(StoreEvent::Edited {
            collection: T::COLLECTION,
            id,
        });

        self.refresh(epoch).await;
        drop(guard);
        Ok(())
    }

    /// Remove a row optimistically, reinserting it in its old slot if the delete fails.
    ///
    /// The slot is found by `(position, id)` rather than by index, so rollbacks
    /// of concurrent removes restore the original order. Siblings are not
    /// renumbered; the gap is tolerated.
    pub async fn remove(&self, id: RowId) -> Result<()> {
        let operation = "remove";
        let (guard, epoch) = self.begin_mutation(operation)?;

        let mut removed = None;
        self.state.send_if_modified(|s| {
            let Some(index) = s.items.iter().position(|r| r.id() == id) else {
                return false;
            };
            removed = Some(s.items.remove(index));
            true
        });
        let Some(entity) = removed else {
            drop(guard);
            return Err(self.reject(
                operation,
                ApiError::NotFound {
                    collection: T::COLLECTION,
                    id,
                },
            ));
        };

        let label = format!("delete {}/{}", T::COLLECTION, id);
        if let Err(err) = self.call(&label, self.gateway.delete(id)).await {
            let message = err.to_string();
            self.state.send_modify(|s| {
                if s.epoch == epoch && !s.items.iter().any(|r| r.id() == id) {
                    let key = (entity.position(), id);
                    let at = s
                        .items
                        .iter()
                        .position(|r| (r.position(), r.id()) > key)
                        .unwrap_or(s.items.len());
                    s.items.insert(at, entity);
                }
                s.last_error = Some(message.clone());
            });
            self.rolled_back(operation, message);
            return Err(err);
        }

        self.state.send_modify(|s| s.last_error = None);
        info!(collection = %T::COLLECTION, id, "row removed");
        self.emit(StoreEvent::Removed {
            collection: T::COLLECTION,
            id,
        });

        self.refresh(epoch).await;
        drop(guard);
        Ok(())
    }

    /// Move the row at `from` to index `to`.
    ///
    /// The new sequence is shown immediately; position writes go out
    /// concurrently and the store settles once all of them have. Any failure
    /// restores the previous sequence. Writes that did succeed are not
    /// compensated remotely; the next `load` resynchronises.
    pub async fn reorder(&self, from: usize, to: usize) -> Result<()> {
        if from == to {
            debug!(collection = %T::COLLECTION, from, "reorder to same index ignored");
            return Ok(());
        }
        self.run_reorder(|items| plan_reorder(items, from, to))
            .await
    }

    /// Drag-and-drop variant of [`reorder`](Self::reorder): move row `active`
    /// into the slot currently held by row `over`.
    pub async fn reorder_by_id(&self, active: RowId, over: RowId) -> Result<()> {
        if active == over {
            return Ok(());
        }
        self.run_reorder(|items| plan_move_by_id(items, active, over))
            .await
    }

    async fn run_reorder<F>(&self, plan_with: F) -> Result<()>
    where
        F: FnOnce(&[T]) -> Result<ReorderPlan<T>>,
    {
        let operation = "reorder";
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        let mut planned = Err(ApiError::invalid("reorder was not planned"));
        self.state.send_if_modified(|s| {
            if !s.accepts_reorder() {
                planned = Err(ApiError::ConcurrentReorderRejected {
                    collection: T::COLLECTION,
                    operation: operation.to_string(),
                });
                return false;
            }
            match plan_with(s.items.as_slice()) {
                Ok(plan) => {
                    s.items = plan.sequence.clone();
                    s.pending_reorder = Some(token);
                    s.reorder = ReorderPhase::Pending;
                    planned = Ok((plan, s.epoch));
                    true
                }
                Err(err) => {
                    planned = Err(err);
                    false
                }
            }
        });
        let (plan, epoch) = planned.map_err(|e| self.reject(operation, e))?;

        let guard = ReorderGuard {
            state: &self.state,
            token,
        };
        let total = plan.writes.len();
        debug!(
            collection = %T::COLLECTION,
            from = plan.from,
            to = plan.to,
            writes = total,
            "reorder applied optimistically"
        );
        self.emit(StoreEvent::ReorderApplied {
            collection: T::COLLECTION,
            writes: total,
        });

        let results = join_all(plan.writes.iter().map(|write| async move {
            let label = format!("update {}/{}", T::COLLECTION, write.id);
            let result = self
                .call(&label, self.gateway.update(write.id, write.fields()))
                .await;
            (write.id, result)
        }))
        .await;

        let failures: Vec<(RowId, ApiError)> = results
            .into_iter()
            .filter_map(|(id, result)| result.err().map(|err| (id, err)))
            .collect();

        if failures.is_empty() {
            self.state.send_if_modified(|s| {
                s.pending_reorder == Some(token) && s.last_error.take().is_some()
            });
            info!(collection = %T::COLLECTION, writes = total, "reorder committed");
            if self.superseded(epoch) {
                self.relist().await;
            }
            drop(guard);
            self.emit(StoreEvent::ReorderCommitted {
                collection: T::COLLECTION,
            });
            return Ok(());
        }

        let failed_ids: Vec<RowId> = failures.iter().map(|(id, _)| *id).collect();
        let err = ApiError::backend(
            format!("reorder {}", T::COLLECTION),
            format!(
                "{} of {} position writes failed, first: {}",
                failures.len(),
                total,
                failures[0].1
            ),
        );
        let message = err.to_string();

        let previous = plan.previous;
        self.state.send_modify(|s| {
            if s.epoch == epoch {
                s.items = previous;
            }
            if s.pending_reorder == Some(token) {
                s.reorder = ReorderPhase::RolledBack;
            }
            s.last_error = Some(message.clone());
        });
        warn!(
            collection = %T::COLLECTION,
            ?failed_ids,
            total,
            "reorder rolled back"
        );
        self.emit(StoreEvent::RolledBack {
            collection: T::COLLECTION,
            operation: operation.to_string(),
            message,
        });
        drop(guard);
        Err(err)
    }

    /// Claim a create/edit/remove slot, or reject while a reorder or a load is pending.
    fn begin_mutation(&self, operation: &str) -> Result<(MutationGuard<'_, T>, u64)> {
        let mut epoch = None;
        self.state.send_if_modified(|s| {
            if !s.accepts_mutations() {
                return false;
            }
            s.mutations_in_flight += 1;
            epoch = Some(s.epoch);
            true
        });

        match epoch {
            Some(epoch) => Ok((
                MutationGuard {
                    state: &self.state,
                },
                epoch,
            )),
            None => Err(self.reject(
                operation,
                ApiError::ConcurrentReorderRejected {
                    collection: T::COLLECTION,
                    operation: operation.to_string(),
                },
            )),
        }
    }

    /// Whether a load landed since `epoch` was taken.
    fn superseded(&self, epoch: u64) -> bool {
        self.state.borrow().epoch != epoch
    }

    /// Re-list after a confirmed mutation started at `epoch`, if configured
    /// or if a load landed in the meantime.
    async fn refresh(&self, epoch: u64) {
        if self.config.refresh_after_mutation || self.superseded(epoch) {
            self.relist().await;
        }
    }

    /// Failures only surface as `last_error`.
    async fn relist(&self) {
        if let Err(err) = self.load().await {
            warn!(collection = %T::COLLECTION, error = %err, "refresh after mutation failed");
        }
    }

    /// Run one gateway call under the configured timeout.
    async fn call<R>(&self, operation: &str, request: impl Future<Output = Result<R>>) -> Result<R> {
        debug!(collection = %T::COLLECTION, operation, "gateway call");
        let result = match self.config.request_timeout() {
            Some(limit) => match tokio::time::timeout(limit, request).await {
                Ok(result) => result,
                Err(_) => Err(ApiError::Timeout {
                    operation: operation.to_string(),
                }),
            },
            None => request.await,
        };

        if let Err(err) = &result {
            error!(collection = %T::COLLECTION, operation, error = %err, "gateway call failed");
        }
        result
    }

    fn emit(&self, event: StoreEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Record a refusal that never reached the gateway.
    fn reject(&self, operation: &str, err: ApiError) -> ApiError {
        warn!(collection = %T::COLLECTION, operation, error = %err, "operation rejected");
        let message = err.to_string();
        self.state
            .send_modify(|s| s.last_error = Some(message.clone()));
        self.emit(StoreEvent::Rejected {
            collection: T::COLLECTION,
            operation: operation.to_string(),
            message,
        });
        err
    }

    /// Record a remote failure of a non-optimistic operation.
    fn fail(&self, operation: &str, err: ApiError) -> ApiError {
        let message = err.to_string();
        self.state
            .send_modify(|s| s.last_error = Some(message.clone()));
        self.emit(StoreEvent::Failed {
            collection: T::COLLECTION,
            operation: operation.to_string(),
            message,
        });
        err
    }

    fn rolled_back(&self, operation: &str, message: String) {
        warn!(collection = %T::COLLECTION, operation, %message, "optimistic change rolled back");
        self.emit(StoreEvent::RolledBack {
            collection: T::COLLECTION,
            operation: operation.to_string(),
            message,
        });
    }
}

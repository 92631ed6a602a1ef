//! Collection traits
//!
//! These traits are the seam between the stateful store and whatever row store
//! actually holds the data. A gateway only ever sees independent per-row calls:
//! there is no cross-call transaction and no "move" primitive.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use folio_api::{ApiError, CollectionKind, Fields, RowId, Value, POSITION_COLUMN};

pub type Result<T> = std::result::Result<T, ApiError>;

// Define MaybeSendSync trait alias for WASM compatibility
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync + ?Sized> MaybeSendSync for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSendSync {}
#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> MaybeSendSync for T {}

/// Reject patches that try to set the id or the position column.
///
/// Ids are assigned by the remote store, and positions only change through a reorder.
pub fn check_patch(fields: &Fields) -> Result<()> {
    for key in ["id", POSITION_COLUMN] {
        if fields.contains_key(key) {
            return Err(ApiError::invalid(format!(
                "field '{}' cannot be set by a field edit",
                key
            )));
        }
    }
    Ok(())
}

/// A row that lives in an ordered collection.
pub trait OrderedEntity:
    Clone + std::fmt::Debug + Serialize + DeserializeOwned + MaybeSendSync + 'static
{
    /// Collection this entity belongs to
    const COLLECTION: CollectionKind;

    /// Whether edits stamp an `updated_at` column
    const TRACKS_UPDATED_AT: bool = false;

    fn id(&self) -> RowId;

    fn position(&self) -> i64;

    fn set_position(&mut self, position: i64);

    /// Return a copy with `fields` applied as a field edit.
    ///
    /// Fails if the patch touches the id or the position column.
    fn patched(&self, fields: &Fields) -> Result<Self> {
        check_patch(fields)?;
        self.with_fields(fields)
    }

    /// Return a copy with `fields` applied, position included.
    ///
    /// Goes through the entity's serde representation, so field names are the
    /// remote column names. Fails if a value does not fit the column type.
    fn with_fields(&self, fields: &Fields) -> Result<Self> {
        let mut json = serde_json::to_value(self).map_err(|e| {
            ApiError::invalid(format!("cannot serialize {} row: {}", Self::COLLECTION, e))
        })?;
        let row = json.as_object_mut().ok_or_else(|| {
            ApiError::invalid(format!("{} row is not a JSON object", Self::COLLECTION))
        })?;
        for (name, value) in fields {
            row.insert(name.clone(), value.clone().into());
        }

        serde_json::from_value(json).map_err(|e| {
            ApiError::invalid(format!(
                "patch does not fit a {} row: {}",
                Self::COLLECTION,
                e
            ))
        })
    }
}

/// Network access for one collection kind.
///
/// Each method is exactly one remote request. Failures come back as
/// `ApiError` values; implementations never retry and never swallow errors.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait RemoteCollection<T>: MaybeSendSync
where
    T: OrderedEntity,
{
    fn kind(&self) -> CollectionKind {
        T::COLLECTION
    }

    /// All rows, ascending by position. Never mutates remote state.
    async fn list(&self) -> Result<Vec<T>>;

    /// Highest stored position, `None` for an empty collection.
    async fn max_position(&self) -> Result<Option<i64>>;

    /// Create a row from `fields` exactly as given (position included).
    async fn insert_row(&self, fields: Fields) -> Result<T>;

    /// Partial update; used for field edits and for position writes.
    async fn update(&self, id: RowId, fields: Fields) -> Result<()>;

    async fn delete(&self, id: RowId) -> Result<()>;

    /// Create a row at the end of the collection.
    ///
    /// The maximum position is re-queried immediately before the insert to keep
    /// the race window with other writers small.
    async fn insert(&self, mut fields: Fields) -> Result<T> {
        check_patch(&fields)?;

        let next = self.max_position().await?.map_or(0, |max| max + 1);
        tracing::debug!(collection = %self.kind(), position = next, "inserting row");
        fields.insert(POSITION_COLUMN.to_string(), Value::Integer(next));

        self.insert_row(fields).await
    }
}

//! Reorder reconciler
//!
//! Turns a single drag-and-drop move into the new sequence plus the set of
//! position writes the remote store needs. The remote store has no "move"
//! primitive, so a move is realised as independent per-row position updates.
//!
//! Positions are reassigned as `0..n-1` over the moved sequence and compared
//! with the positions each row currently carries. Only rows whose stored
//! position differs from its new index get a write. For a collection that is
//! already `0..n-1` this is exactly the contiguous run between the two indices.

use folio_api::{fields, ApiError, Fields, RowId, Value, POSITION_COLUMN};

use crate::traits::{OrderedEntity, Result};

/// A single position update for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionWrite {
    pub id: RowId,
    pub position: i64,
}

impl PositionWrite {
    /// Field patch for the gateway's `update` call
    pub fn fields(&self) -> Fields {
        fields([(POSITION_COLUMN, Value::Integer(self.position))])
    }
}

/// Result of planning a move.
#[derive(Debug, Clone)]
pub struct ReorderPlan<T> {
    pub from: usize,
    pub to: usize,
    /// Sequence before the move, kept for rollback
    pub previous: Vec<T>,
    /// Sequence after the move, positions equal to indices
    pub sequence: Vec<T>,
    /// Rows whose stored position changes
    pub writes: Vec<PositionWrite>,
}

/// Move the element at `from` so that it ends up at index `to`.
///
/// Remove-then-insert semantics: elements between the two indices shift by one.
/// Out-of-range indices leave `items` untouched.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from >= items.len() || to >= items.len() || from == to {
        return;
    }
    let item = items.remove(from);
    items.insert(to, item);
}

/// Plan moving the row at index `from` to index `to`.
pub fn plan_reorder<T: OrderedEntity>(
    items: &[T],
    from: usize,
    to: usize,
) -> Result<ReorderPlan<T>> {
    let len = items.len();
    if from >= len || to >= len {
        return Err(ApiError::invalid(format!(
            "reorder {} -> {} out of range for {} {} rows",
            from,
            to,
            len,
            T::COLLECTION
        )));
    }

    let previous = items.to_vec();
    let mut sequence = previous.clone();
    move_item(&mut sequence, from, to);

    let mut writes = Vec::new();
    for (index, item) in sequence.iter_mut().enumerate() {
        let position = index as i64;
        if item.position() != position {
            writes.push(PositionWrite {
                id: item.id(),
                position,
            });
            item.set_position(position);
        }
    }

    tracing::trace!(
        collection = %T::COLLECTION,
        from,
        to,
        writes = writes.len(),
        "planned reorder"
    );

    Ok(ReorderPlan {
        from,
        to,
        previous,
        sequence,
        writes,
    })
}

/// Plan a drag of row `active` onto the slot currently held by row `over`.
pub fn plan_move_by_id<T: OrderedEntity>(
    items: &[T],
    active: RowId,
    over: RowId,
) -> Result<ReorderPlan<T>> {
    let from = index_of(items, active)?;
    let to = index_of(items, over)?;
    plan_reorder(items, from, to)
}

fn index_of<T: OrderedEntity>(items: &[T], id: RowId) -> Result<usize> {
    items
        .iter()
        .position(|item| item.id() == id)
        .ok_or(ApiError::NotFound {
            collection: T::COLLECTION,
            id,
        })
}

//! Observable store state and events

use folio_api::{CollectionKind, RowId};

/// Progress of the most recent `load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
    /// Last load failed; the previous sequence is still shown
    LoadError,
}

/// Reorder lifecycle, orthogonal to loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReorderPhase {
    #[default]
    Idle,
    /// Optimistic sequence shown, position writes in flight
    Pending,
    /// A write failed and the previous sequence was restored
    RolledBack,
}

/// Combined view of the two phases, in the order a UI would badge them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    Idle,
    Loading,
    LoadError,
    ReorderPending,
    RolledBack,
}

/// Snapshot of one collection as the UI sees it.
#[derive(Debug, Clone)]
pub struct CollectionState<T> {
    pub items: Vec<T>,
    pub load: LoadPhase,
    pub reorder: ReorderPhase,
    pub last_error: Option<String>,
    /// Bumped by every successful load; settlements from older epochs leave `items` alone
    pub(crate) epoch: u64,
    /// Sequence number of the newest `load` call
    pub(crate) load_seq: u64,
    /// Create, edit and remove calls awaiting the gateway
    pub(crate) mutations_in_flight: usize,
    /// Token of the reorder currently awaiting its writes
    pub(crate) pending_reorder: Option<u64>,
}

impl<T> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            load: LoadPhase::Idle,
            reorder: ReorderPhase::Idle,
            last_error: None,
            epoch: 0,
            load_seq: 0,
            mutations_in_flight: 0,
            pending_reorder: None,
        }
    }
}

impl<T> CollectionState<T> {
    pub fn is_loading(&self) -> bool {
        self.load == LoadPhase::Loading
    }

    pub fn phase(&self) -> StorePhase {
        match (self.reorder, self.load) {
            (ReorderPhase::Pending, _) => StorePhase::ReorderPending,
            (ReorderPhase::RolledBack, _) => StorePhase::RolledBack,
            (_, LoadPhase::Loading) => StorePhase::Loading,
            (_, LoadPhase::LoadError) => StorePhase::LoadError,
            (_, LoadPhase::Idle) => StorePhase::Idle,
        }
    }

    pub fn reorder_pending(&self) -> bool {
        self.pending_reorder.is_some()
    }

    pub fn mutations_in_flight(&self) -> usize {
        self.mutations_in_flight
    }

    /// Whether mutation controls should be enabled.
    ///
    /// A listing in flight may predate any change started now, so mutations
    /// wait for it to land.
    pub fn accepts_mutations(&self) -> bool {
        !self.reorder_pending() && !self.is_loading()
    }

    /// Whether a new reorder would be accepted.
    pub fn accepts_reorder(&self) -> bool {
        self.accepts_mutations() && self.mutations_in_flight == 0
    }
}

/// Notifications for observers, including transient states a snapshot can miss.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Loaded {
        collection: CollectionKind,
        count: usize,
    },
    Created {
        collection: CollectionKind,
        id: RowId,
    },
    Edited {
        collection: CollectionKind,
        id: RowId,
    },
    Removed {
        collection: CollectionKind,
        id: RowId,
    },
    /// Optimistic sequence rendered, `writes` position updates issued
    ReorderApplied {
        collection: CollectionKind,
        writes: usize,
    },
    ReorderCommitted {
        collection: CollectionKind,
    },
    /// An optimistic change was reverted after a remote failure
    RolledBack {
        collection: CollectionKind,
        operation: String,
        message: String,
    },
    /// Operation refused before reaching the gateway
    Rejected {
        collection: CollectionKind,
        operation: String,
        message: String,
    },
    /// Non-optimistic operation failed; nothing to revert
    Failed {
        collection: CollectionKind,
        operation: String,
        message: String,
    },
}

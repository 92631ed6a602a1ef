//! Ordered collection store and its observable state

pub mod ordered_store;
pub mod state;

pub use ordered_store::OrderedCollectionStore;
pub use state::{CollectionState, LoadPhase, ReorderPhase, StoreEvent, StorePhase};

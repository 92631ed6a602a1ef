pub mod config;
pub mod dashboard;
pub mod gateway;
pub mod store;

pub use config::StoreConfig;
pub use dashboard::{Dashboard, Gateways, Overview};
pub use gateway::{GatewayCall, GatewayOp, MemoryCollection};
pub use store::{
    CollectionState, LoadPhase, OrderedCollectionStore, ReorderPhase, StoreEvent, StorePhase,
};

// Re-export the shared types so frontends only need this crate
pub use folio_api::{
    fields, group_by_company, ApiError, Certificate, CollectionKind, Education, Experience, Fields,
    RowId, Skill, Value,
};
pub use folio_core::{OrderedEntity, PositionWrite, RemoteCollection, ReorderPlan};

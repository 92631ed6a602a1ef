//! Core seams for ordered collections
//!
//! This crate provides:
//! - `OrderedEntity`: rows that carry an id and a display position
//! - `RemoteCollection`: the gateway every network call goes through
//! - `reorder`: the reconciler that turns a drag-and-drop move into position writes

pub mod entities;
pub mod reorder;
pub mod traits;

pub use reorder::{move_item, plan_move_by_id, plan_reorder, PositionWrite, ReorderPlan};
pub use traits::{check_patch, MaybeSendSync, OrderedEntity, RemoteCollection, Result};

//! Shared types for the omnia hydration engine.
//!
//! The remote item API hands out flat records whose reference fields carry ids
//! in several historical shapes. These types give those records, their ids, and
//! the declarative hydration rules a single canonical form that both the engine
//! and its callers agree on.

mod ids;
mod item;
mod plan;

pub use ids::{ResourceId, normalize, normalize_value, parse_id_list, split_csv};
pub use item::{HydratedItem, ID_FIELD, RawItem, TYPE_FIELD};
pub use plan::{
    Cardinality, FetchPlan, FetchPlanBuilder, LegacyFormat, ReferenceSpec, default_action,
};

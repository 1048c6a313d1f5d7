//! Omnia: a hydrating, session-cached read client for an Omeka-style item API.
//!
//! A [`FetchPlan`](types::FetchPlan) names a collection and the references
//! its records carry. [`Hydrator`](application::Hydrator) loads the
//! collection together with every collection those references point into,
//! embeds the referenced records, and keeps the result for the rest of the
//! session.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;

pub use omnia_types as types;

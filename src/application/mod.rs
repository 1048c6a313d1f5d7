//! Application services: hydration, reference resolution and item writes.

pub mod catalog;
pub mod error;
mod flight;
pub mod hydrate;
pub mod repos;
pub mod resolve;
pub mod writer;

pub use catalog::{Catalog, Resources};
pub use error::{AppError, ErrorReport, HydrateError};
pub use flight::HydratedCollection;
pub use hydrate::{Hydrator, Resource};
pub use repos::{CollectionFetcher, FetchError, ItemTransport, WriteError};
pub use writer::ItemWriter;

pub(crate) use flight::METRIC_FLIGHT_JOINED;
pub(crate) use hydrate::{METRIC_CACHE_LOOKUP, METRIC_FETCH, METRIC_FETCH_FAILURE, METRIC_HYDRATE_MS};

//! Collection hydration.
//!
//! [`Hydrator`] serves hydrated collections: from the session cache when
//! present, otherwise by fetching the collection and its dependencies
//! concurrently, resolving every reference and caching the result.

use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use metrics::{counter, histogram};
use omnia_types::{FetchPlan, HydratedItem, RawItem, ResourceId, default_action};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::HydrateError;
use super::flight::{Boarding, FlightOutcome, FlightRegistry, HydratedCollection, Ticket};
use super::repos::CollectionFetcher;
use super::resolve::{Indices, LookupIndex, hydrate_items};
use crate::cache::CacheStore;

pub(crate) const METRIC_CACHE_LOOKUP: &str = "omnia_cache_lookup_total";
pub(crate) const METRIC_FETCH: &str = "omnia_fetch_total";
pub(crate) const METRIC_FETCH_FAILURE: &str = "omnia_fetch_failure_total";
pub(crate) const METRIC_HYDRATE_MS: &str = "omnia_hydrate_ms";

/// Result of [`Hydrator::get_resource`].
#[derive(Debug, Clone)]
pub enum Resource {
    Collection(HydratedCollection),
    Item(HydratedItem),
    /// An id was requested and no record of the collection carries it.
    Missing,
}

impl Resource {
    pub fn into_collection(self) -> Option<HydratedCollection> {
        match self {
            Resource::Collection(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_item(self) -> Option<HydratedItem> {
        match self {
            Resource::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Resource::Missing)
    }
}

#[derive(Clone)]
pub struct Hydrator {
    inner: Arc<Inner>,
}

struct Inner {
    fetcher: Arc<dyn CollectionFetcher>,
    store: Arc<dyn CacheStore>,
    flights: FlightRegistry,
}

impl Hydrator {
    pub fn new(fetcher: Arc<dyn CollectionFetcher>, store: Arc<dyn CacheStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                store,
                flights: FlightRegistry::default(),
            }),
        }
    }

    /// The whole collection when `id` is `None`, otherwise the single record
    /// whose normalized id equals `id`.
    pub async fn get_resource(
        &self,
        plan: &FetchPlan,
        id: Option<ResourceId>,
    ) -> Result<Resource, HydrateError> {
        let items = self.load(plan, None).await?;
        Ok(select(items, id))
    }

    /// [`Hydrator::get_resource`] that gives up once `cancel` fires.
    ///
    /// Cancelling only detaches this caller. The underlying load keeps running
    /// while any other caller still waits on it.
    pub async fn get_resource_with(
        &self,
        plan: &FetchPlan,
        id: Option<ResourceId>,
        cancel: &CancellationToken,
    ) -> Result<Resource, HydrateError> {
        let items = self.load(plan, Some(cancel)).await?;
        Ok(select(items, id))
    }

    pub async fn get_all(&self, plan: &FetchPlan) -> Result<HydratedCollection, HydrateError> {
        self.load(plan, None).await
    }

    pub async fn get_one(
        &self,
        plan: &FetchPlan,
        id: impl Into<ResourceId>,
    ) -> Result<Option<HydratedItem>, HydrateError> {
        let items = self.load(plan, None).await?;
        Ok(select(items, Some(id.into())).into_item())
    }

    /// Drop the cached entry of one collection. The next read refetches it.
    pub fn invalidate(&self, name: &str) {
        info!(collection = name, "Invalidating cached collection");
        self.inner.store.clear(Some(name));
    }

    pub fn invalidate_all(&self) {
        info!("Invalidating every cached collection");
        self.inner.store.clear(None);
    }

    /// Whether a load of `name` is currently running.
    pub fn is_loading(&self, name: &str) -> bool {
        self.inner.flights.is_in_flight(name)
    }

    async fn load(
        &self,
        plan: &FetchPlan,
        cancel: Option<&CancellationToken>,
    ) -> Result<HydratedCollection, HydrateError> {
        let name = plan.name();
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(HydrateError::cancelled(name));
        }

        if let Some(hit) = self.inner.read_cache(name) {
            counter!(METRIC_CACHE_LOOKUP, "result" => "hit").increment(1);
            debug!(collection = name, items = hit.len(), "Cache hit");
            return Ok(hit);
        }

        let boarding = self.inner.flights.board(
            name,
            || self.inner.read_cache(name),
            |ticket| self.launch(plan, ticket),
        );
        match boarding {
            Boarding::Cached(hit) => {
                counter!(METRIC_CACHE_LOOKUP, "result" => "hit").increment(1);
                debug!(collection = name, items = hit.len(), "Cache hit after load landed");
                Ok(hit)
            }
            Boarding::Flight(flight) => flight.wait(name, cancel).await,
        }
    }

    fn launch(&self, plan: &FetchPlan, ticket: Ticket) -> BoxFuture<'static, FlightOutcome> {
        counter!(METRIC_CACHE_LOOKUP, "result" => "miss").increment(1);
        debug!(collection = plan.name(), flight = ticket.id, "Cache miss");

        let inner = Arc::clone(&self.inner);
        let plan = plan.clone();
        let collection = plan.name().to_owned();
        let task = tokio::spawn(async move {
            let Ticket { cancel, landing, .. } = ticket;
            let outcome = inner.hydrate(&plan, &cancel).await;
            drop(landing);
            outcome
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => Err(HydrateError::Aborted {
                    collection,
                    reason: err.to_string(),
                }),
            }
        }
        .boxed()
    }
}

fn select(items: HydratedCollection, id: Option<ResourceId>) -> Resource {
    match id {
        None => Resource::Collection(items),
        Some(id) => items
            .iter()
            .find(|item| item.id().as_ref() == Some(&id))
            .cloned()
            .map_or(Resource::Missing, Resource::Item),
    }
}

impl Inner {
    fn read_cache(&self, name: &str) -> Option<HydratedCollection> {
        let value = self.store.get(name)?;
        match serde_json::from_value::<Vec<HydratedItem>>(value) {
            Ok(items) => Some(Arc::new(items)),
            Err(err) => {
                warn!(
                    collection = name,
                    error = %err,
                    "Cached entry is not a hydrated collection; treating as miss"
                );
                None
            }
        }
    }

    fn write_cache(&self, name: &str, items: &[HydratedItem]) {
        let value = match serde_json::to_value(items) {
            Ok(value) => value,
            Err(err) => {
                warn!(collection = name, error = %err, "Failed to encode hydrated collection");
                return;
            }
        };
        if let Err(err) = self.store.set(name, &value) {
            warn!(collection = name, error = %err, "Failed to cache hydrated collection");
        }
    }

    async fn hydrate(&self, plan: &FetchPlan, cancel: &CancellationToken) -> FlightOutcome {
        let started_at = Instant::now();
        let name = plan.name();
        let required = plan.required_collections();
        debug!(collection = name, required = ?required, "Fetching collections");

        let fetches = required
            .iter()
            .map(|collection| self.fetch(plan, collection, cancel));
        let fetched = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(collection = name, "Load cancelled before completion");
                return Err(HydrateError::cancelled(name));
            }
            fetched = try_join_all(fetches) => fetched,
        };
        let mut fetched = match fetched {
            Ok(fetched) => fetched,
            Err(err) => {
                if err.is_cancelled() {
                    debug!(collection = name, "Load cancelled during fetch");
                } else {
                    error!(collection = name, error = ?err, "Failed to load collection");
                }
                return Err(err);
            }
        };

        let dependencies = plan.dependencies();
        let indices: Indices = required
            .iter()
            .zip(&fetched)
            .filter(|(collection, _)| dependencies.contains(*collection))
            .map(|(collection, items)| ((*collection).to_owned(), LookupIndex::build(items)))
            .collect();

        // `required_collections` always lists the main collection first
        let main = fetched.first_mut().map(std::mem::take).unwrap_or_default();
        let items = hydrate_items(plan, &main, &indices);
        self.write_cache(name, &items);

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_HYDRATE_MS).record(elapsed_ms);
        info!(
            collection = name,
            items = items.len(),
            dependencies = dependencies.len(),
            elapsed_ms,
            "Hydrated collection"
        );
        Ok(Arc::new(items))
    }

    async fn fetch(
        &self,
        plan: &FetchPlan,
        collection: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawItem>, HydrateError> {
        let action = if collection == plan.name() {
            plan.action().to_owned()
        } else {
            default_action(collection)
        };
        counter!(METRIC_FETCH, "collection" => collection.to_owned()).increment(1);

        let items = self
            .fetcher
            .fetch(collection, &action, cancel)
            .await
            .map_err(|err| {
                let err = HydrateError::from_fetch(plan.name(), collection, err);
                if !err.is_cancelled() {
                    counter!(METRIC_FETCH_FAILURE, "collection" => collection.to_owned())
                        .increment(1);
                }
                err
            })?;
        debug!(collection, action = %action, items = items.len(), "Fetched collection");
        Ok(items)
    }
}

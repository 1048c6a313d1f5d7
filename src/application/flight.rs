//! Single-flight bookkeeping for collection loads.
//!
//! At most one load per collection name is live. Later callers attach to it
//! and receive the same outcome. A load is cancelled only after every caller
//! that could cancel has done so; callers without a token keep it alive.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use metrics::counter;
use omnia_types::HydratedItem;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::HydrateError;

pub(crate) const METRIC_FLIGHT_JOINED: &str = "omnia_flight_joined_total";

/// A fully hydrated collection, shared between callers.
pub type HydratedCollection = Arc<Vec<HydratedItem>>;

pub(crate) type FlightOutcome = Result<HydratedCollection, HydrateError>;

pub(crate) struct Flight {
    id: u64,
    cancel: CancellationToken,
    interested: AtomicUsize,
    outcome: Shared<BoxFuture<'static, FlightOutcome>>,
}

impl Flight {
    /// Register one more caller unless the flight has already lost all of them.
    fn try_join(&self) -> bool {
        self.interested
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count > 0).then_some(count + 1)
            })
            .is_ok()
    }

    fn release(&self) {
        if self.interested.fetch_sub(1, Ordering::AcqRel) == 1 {
            debug!(flight = self.id, "Every caller gave up; cancelling load");
            self.cancel.cancel();
        }
    }

    /// Wait for the outcome.
    ///
    /// With a token, the caller stops waiting as soon as the token fires and
    /// withdraws its interest; dropping the returned future does the same.
    pub(crate) async fn wait(
        &self,
        collection: &str,
        cancel: Option<&CancellationToken>,
    ) -> FlightOutcome {
        let mut interest = Interest {
            flight: self,
            armed: cancel.is_some(),
        };
        let outcome = match cancel {
            None => self.outcome.clone().await,
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(HydrateError::cancelled(collection)),
                outcome = self.outcome.clone() => outcome,
            },
        };
        interest.armed = false;
        outcome
    }
}

struct Interest<'a> {
    flight: &'a Flight,
    armed: bool,
}

impl Drop for Interest<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flight.release();
        }
    }
}

pub(crate) enum Boarding {
    Cached(HydratedCollection),
    Flight(Arc<Flight>),
}

/// Identity handed to a freshly started load.
pub(crate) struct Ticket {
    pub(crate) id: u64,
    pub(crate) cancel: CancellationToken,
    pub(crate) landing: Landing,
}

/// Unregisters a flight when dropped, unless a newer flight took its slot.
pub(crate) struct Landing {
    name: String,
    id: u64,
    flights: Arc<DashMap<String, Arc<Flight>>>,
}

impl Drop for Landing {
    fn drop(&mut self) {
        self.flights
            .remove_if(&self.name, |_, flight| flight.id == self.id);
    }
}

#[derive(Default, Clone)]
pub(crate) struct FlightRegistry {
    flights: Arc<DashMap<String, Arc<Flight>>>,
    next_id: Arc<AtomicU64>,
}

impl FlightRegistry {
    /// Attach to the live flight for `name` or start a new one.
    ///
    /// With no live flight, `cached` is consulted while the slot is held, so a
    /// flight that finished between the caller's first cache check and now is
    /// seen through its cache write. Otherwise `start` is invoked with a ticket
    /// and must return the load; the ticket's [`Landing`] has to be dropped
    /// only after the result has been written to the cache.
    pub(crate) fn board<C, S>(&self, name: &str, cached: C, start: S) -> Boarding
    where
        C: FnOnce() -> Option<HydratedCollection>,
        S: FnOnce(Ticket) -> BoxFuture<'static, FlightOutcome>,
    {
        let entry = self.flights.entry(name.to_owned());
        if let Entry::Occupied(occupied) = &entry
            && occupied.get().try_join()
        {
            let flight = Arc::clone(occupied.get());
            counter!(METRIC_FLIGHT_JOINED).increment(1);
            debug!(collection = name, flight = flight.id, "Joined in-flight load");
            return Boarding::Flight(flight);
        }

        if let Some(hit) = cached() {
            return Boarding::Cached(hit);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let ticket = Ticket {
            id,
            cancel: cancel.clone(),
            landing: Landing {
                name: name.to_owned(),
                id,
                flights: Arc::clone(&self.flights),
            },
        };
        let flight = Arc::new(Flight {
            id,
            cancel,
            interested: AtomicUsize::new(1),
            outcome: start(ticket).shared(),
        });
        entry.insert(Arc::clone(&flight));
        debug!(collection = name, flight = id, "Started load");
        Boarding::Flight(flight)
    }

    pub(crate) fn is_in_flight(&self, name: &str) -> bool {
        self.flights.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    fn pending_flight(
        registry: &FlightRegistry,
        name: &str,
    ) -> (Arc<Flight>, oneshot::Sender<()>, CancellationToken) {
        let (release, gate) = oneshot::channel::<()>();
        let mut seen_token = None;
        let boarding = registry.board(
            name,
            || None,
            |ticket| {
                seen_token = Some(ticket.cancel.clone());
                let landing = ticket.landing;
                let cancel = ticket.cancel;
                async move {
                    tokio::select! {
                        _ = cancel.cancelled() => Err(HydrateError::cancelled("x")),
                        _ = gate => {
                            drop(landing);
                            Ok(Arc::new(Vec::new()))
                        }
                    }
                }
                .boxed()
            },
        );
        let Boarding::Flight(flight) = boarding else {
            panic!("expected a new flight");
        };
        (flight, release, seen_token.expect("start invoked"))
    }

    #[tokio::test]
    async fn second_caller_joins_live_flight() {
        let registry = FlightRegistry::default();
        let (first, release, _) = pending_flight(&registry, "actants");

        let joined = registry.board("actants", || None, |_| panic!("must not start"));
        let Boarding::Flight(second) = joined else {
            panic!("expected to join");
        };
        assert_eq!(first.id, second.id);

        release.send(()).expect("gate");
        assert!(first.wait("actants", None).await.is_ok());
        assert!(!registry.is_in_flight("actants"));
    }

    #[tokio::test]
    async fn cache_is_rechecked_when_no_flight_is_live() {
        let registry = FlightRegistry::default();
        let hit = Arc::new(Vec::new());
        let boarding = registry.board(
            "keywords",
            || Some(Arc::clone(&hit)),
            |_| panic!("must not start"),
        );
        assert!(matches!(boarding, Boarding::Cached(_)));
    }

    #[tokio::test]
    async fn flight_is_cancelled_only_when_every_caller_cancels() {
        let registry = FlightRegistry::default();
        let (flight, _release, flight_token) = pending_flight(&registry, "works");
        let Boarding::Flight(joined) = registry.board("works", || None, |_| panic!("no start"))
        else {
            panic!("expected to join");
        };

        let first = CancellationToken::new();
        let second = CancellationToken::new();
        first.cancel();
        let outcome = flight.wait("works", Some(&first)).await;
        assert!(matches!(outcome, Err(HydrateError::Cancelled { .. })));
        assert!(!flight_token.is_cancelled());

        let waiter = {
            let second = second.clone();
            tokio::spawn(async move { joined.wait("works", Some(&second)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        second.cancel();
        let outcome = waiter.await.expect("join");
        assert!(outcome.is_err());
        assert!(flight_token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_flight_is_replaced() {
        let registry = FlightRegistry::default();
        let (flight, _release, flight_token) = pending_flight(&registry, "seminars");
        let token = CancellationToken::new();
        token.cancel();
        let _ = flight.wait("seminars", Some(&token)).await;
        assert!(flight_token.is_cancelled());

        let (replacement, release, _) = pending_flight(&registry, "seminars");
        assert_ne!(flight.id, replacement.id);
        release.send(()).expect("gate");
        assert!(replacement.wait("seminars", None).await.is_ok());
    }
}

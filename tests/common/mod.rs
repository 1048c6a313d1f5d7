#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use omnia::application::{CollectionFetcher, FetchError};
use omnia::types::RawItem;
use serde_json::{Value, json};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// In-memory fetcher serving fixed collections and recording every call.
#[derive(Default)]
pub struct FakeFetcher {
    collections: HashMap<String, Value>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(String, String)>>,
    gate: Option<Semaphore>,
    cancelled: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, collection: &str, records: Value) -> Self {
        self.collections.insert(collection.to_owned(), records);
        self
    }

    /// Hold every fetch until [`FakeFetcher::open`] is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn open(&self) {
        if let Some(gate) = self.gate.as_ref() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn fail(&self, collection: &str) {
        self.failing
            .lock()
            .expect("failing lock")
            .insert(collection.to_owned());
    }

    pub fn heal(&self, collection: &str) {
        self.failing.lock().expect("failing lock").remove(collection);
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    pub fn calls_for(&self, collection: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|(name, _)| name == collection)
            .count()
    }

    pub fn actions(&self) -> Vec<String> {
        let mut actions: Vec<String> = self
            .calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(_, action)| action.clone())
            .collect();
        actions.sort();
        actions
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollectionFetcher for FakeFetcher {
    async fn fetch(
        &self,
        collection: &str,
        action: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawItem>, FetchError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((collection.to_owned(), action.to_owned()));

        if let Some(gate) = self.gate.as_ref() {
            // counts a cancellation whether the token fires here or the caller
            // drops this future while it waits at the gate
            let mut waiting = Waiting {
                cancelled: &self.cancelled,
                armed: true,
            };
            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                permit = gate.acquire() => drop(permit),
            }
            waiting.armed = false;
        }

        if self.failing.lock().expect("failing lock").contains(collection) {
            return Err(FetchError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }

        let records = self
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_else(|| json!([]));
        Ok(serde_json::from_value(records).expect("fixture records"))
    }
}

struct Waiting<'a> {
    cancelled: &'a AtomicUsize,
    armed: bool,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub fn shared(fetcher: FakeFetcher) -> Arc<FakeFetcher> {
    Arc::new(fetcher)
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

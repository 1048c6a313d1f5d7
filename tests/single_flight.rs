//! Concurrent callers, shared loads and cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use omnia::application::{Catalog, HydrateError, Hydrator};
use omnia::cache::{CacheConfig, CacheStore, MemoryStore};
use omnia::types::{FetchPlan, ReferenceSpec};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{FakeFetcher, eventually, shared};

fn universities_plan() -> FetchPlan {
    Catalog::global()
        .get("universities")
        .expect("universities plan")
        .clone()
}

fn gated_universities() -> Arc<FakeFetcher> {
    shared(
        FakeFetcher::new()
            .with("universities", json!([{ "id": "10", "name": "U1" }]))
            .gated(),
    )
}

fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new(&CacheConfig::default()))
}

#[tokio::test]
async fn concurrent_callers_share_one_fetch() {
    let fetcher = gated_universities();
    let hydrator = Hydrator::new(fetcher.clone(), memory_store());
    let plan = universities_plan();

    let callers: Vec<_> = (0..5)
        .map(|_| {
            let hydrator = hydrator.clone();
            let plan = plan.clone();
            tokio::spawn(async move { hydrator.get_all(&plan).await })
        })
        .collect();

    eventually("the first fetch", || fetcher.total_calls() == 1).await;
    assert!(hydrator.is_loading("universities"));
    fetcher.open();

    let results = join_all(callers).await;
    let first = results[0].as_ref().expect("join").as_ref().expect("load");
    for result in &results {
        let items = result.as_ref().expect("join").as_ref().expect("load");
        assert!(Arc::ptr_eq(first, items));
    }
    assert_eq!(fetcher.total_calls(), 1);
    assert!(!hydrator.is_loading("universities"));
}

#[tokio::test]
async fn dependencies_are_fetched_concurrently() {
    let fetcher = shared(
        FakeFetcher::new()
            .with(
                "actants",
                json!([{ "id": "1", "universityIds": ["10"], "laboratoryIds": ["3"] }]),
            )
            .with("universities", json!([{ "id": "10" }]))
            .with("laboratories", json!([{ "id": "3" }]))
            .gated(),
    );
    let hydrator = Hydrator::new(fetcher.clone(), memory_store());
    let plan = FetchPlan::builder("actants")
        .reference(ReferenceSpec::array("universityIds", "universities", "universities"))
        .reference(ReferenceSpec::array("laboratoryIds", "laboratories", "laboratories"))
        .build();

    let load = {
        let hydrator = hydrator.clone();
        tokio::spawn(async move { hydrator.get_all(&plan).await })
    };

    // every request is in flight before any of them is allowed to answer
    eventually("all three fetches", || fetcher.total_calls() == 3).await;
    fetcher.open();

    let actants = load.await.expect("join").expect("load");
    assert_eq!(actants[0].get("laboratories"), Some(&json!([{ "id": "3" }])));
}

#[tokio::test]
async fn sole_caller_cancelling_aborts_the_load() {
    let fetcher = gated_universities();
    let store = memory_store();
    let hydrator = Hydrator::new(fetcher.clone(), store.clone());
    let plan = universities_plan();
    let cancel = CancellationToken::new();

    let caller = {
        let hydrator = hydrator.clone();
        let plan = plan.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { hydrator.get_resource_with(&plan, None, &cancel).await })
    };

    eventually("the fetch to start", || fetcher.total_calls() == 1).await;
    cancel.cancel();

    let err = caller.await.expect("join").expect_err("cancelled");
    assert!(err.is_cancelled());
    eventually("the fetcher to observe cancellation", || fetcher.cancelled() == 1).await;
    eventually("the load to unregister", || !hydrator.is_loading("universities")).await;
    assert!(store.get("universities").is_none());

    fetcher.open();
    let items = hydrator.get_all(&plan).await.expect("fresh load");
    assert_eq!(items.len(), 1);
    assert_eq!(fetcher.total_calls(), 2);
}

#[tokio::test]
async fn one_caller_cancelling_leaves_the_others_running() {
    let fetcher = gated_universities();
    let hydrator = Hydrator::new(fetcher.clone(), memory_store());
    let plan = universities_plan();
    let cancel = CancellationToken::new();

    let patient = {
        let hydrator = hydrator.clone();
        let plan = plan.clone();
        tokio::spawn(async move { hydrator.get_all(&plan).await })
    };
    eventually("the fetch to start", || fetcher.total_calls() == 1).await;

    let impatient = {
        let hydrator = hydrator.clone();
        let plan = plan.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { hydrator.get_resource_with(&plan, None, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let err = impatient.await.expect("join").expect_err("cancelled");
    assert!(matches!(err, HydrateError::Cancelled { .. }));
    assert_eq!(fetcher.cancelled(), 0);

    fetcher.open();
    let items = patient.await.expect("join").expect("load");
    assert_eq!(items.len(), 1);
    assert_eq!(fetcher.total_calls(), 1);
}

#[tokio::test]
async fn load_survives_until_every_token_holder_cancels() {
    let fetcher = gated_universities();
    let hydrator = Hydrator::new(fetcher.clone(), memory_store());
    let plan = universities_plan();
    let first = CancellationToken::new();
    let second = CancellationToken::new();

    let spawn_caller = |cancel: CancellationToken| {
        let hydrator = hydrator.clone();
        let plan = plan.clone();
        tokio::spawn(async move { hydrator.get_resource_with(&plan, None, &cancel).await })
    };
    let one = spawn_caller(first.clone());
    eventually("the fetch to start", || fetcher.total_calls() == 1).await;
    let two = spawn_caller(second.clone());
    tokio::time::sleep(Duration::from_millis(20)).await;

    first.cancel();
    assert!(one.await.expect("join").is_err());
    assert_eq!(fetcher.cancelled(), 0);
    assert!(hydrator.is_loading("universities"));

    second.cancel();
    assert!(two.await.expect("join").is_err());
    eventually("the fetcher to observe cancellation", || fetcher.cancelled() == 1).await;
}

#[tokio::test]
async fn dropping_a_waiting_caller_withdraws_its_interest() {
    let fetcher = gated_universities();
    let hydrator = Hydrator::new(fetcher.clone(), memory_store());
    let plan = universities_plan();
    let cancel = CancellationToken::new();

    let caller = {
        let hydrator = hydrator.clone();
        let plan = plan.clone();
        tokio::spawn(async move { hydrator.get_resource_with(&plan, None, &cancel).await })
    };
    eventually("the fetch to start", || fetcher.total_calls() == 1).await;

    caller.abort();
    assert!(caller.await.is_err());
    eventually("the fetcher to observe cancellation", || fetcher.cancelled() == 1).await;
}

#[tokio::test]
async fn joined_callers_all_see_the_failure() {
    let fetcher = gated_universities();
    fetcher.fail("universities");
    let store = memory_store();
    let hydrator = Hydrator::new(fetcher.clone(), store.clone());
    let plan = universities_plan();

    let callers: Vec<_> = (0..3)
        .map(|_| {
            let hydrator = hydrator.clone();
            let plan = plan.clone();
            tokio::spawn(async move { hydrator.get_all(&plan).await })
        })
        .collect();
    eventually("the fetch to start", || fetcher.total_calls() == 1).await;
    fetcher.open();

    for result in join_all(callers).await {
        let err = result.expect("join").expect_err("shared failure");
        assert!(matches!(err, HydrateError::Fetch { .. }));
    }
    assert_eq!(fetcher.total_calls(), 1);
    assert!(store.get("universities").is_none());
}

#[tokio::test]
async fn pre_cancelled_token_never_fetches() {
    let fetcher = gated_universities();
    let hydrator = Hydrator::new(fetcher.clone(), memory_store());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = hydrator
        .get_resource_with(&universities_plan(), None, &cancel)
        .await
        .expect_err("cancelled");
    assert!(err.is_cancelled());
    assert_eq!(fetcher.total_calls(), 0);
}

//! Hydration behaviour against an in-memory fetcher and cache.

mod common;

use std::sync::Arc;

use omnia::application::{Catalog, HydrateError, Hydrator, Resource, Resources};
use omnia::cache::{CacheConfig, CacheStore, DisabledStore, MemoryStore};
use omnia::types::{FetchPlan, LegacyFormat, ReferenceSpec, ResourceId};
use serde_json::json;

use common::{FakeFetcher, shared};

fn actants_fixture() -> FakeFetcher {
    FakeFetcher::new()
        .with(
            "actants",
            json!([{ "id": "1", "name": "Ada", "universityIds": ["10", "20"] }]),
        )
        .with(
            "universities",
            json!([{ "id": "10", "name": "U1" }, { "id": "20", "name": "U2" }]),
        )
}

fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new(&CacheConfig::default()))
}

fn actants_plan() -> &'static FetchPlan {
    Catalog::global().get("actants").expect("actants plan")
}

#[tokio::test]
async fn array_references_are_embedded_and_typed() {
    let fetcher = shared(actants_fixture());
    let hydrator = Hydrator::new(fetcher.clone(), memory_store());

    let actants = hydrator.get_all(actants_plan()).await.expect("hydrated");

    assert_eq!(actants.len(), 1);
    assert_eq!(
        actants[0].get("universities"),
        Some(&json!([{ "id": "10", "name": "U1" }, { "id": "20", "name": "U2" }]))
    );
    assert_eq!(actants[0].item_type(), Some("actant"));
    assert_eq!(
        fetcher.actions(),
        [
            "getActants",
            "getDoctoralSchools",
            "getLaboratories",
            "getUniversities"
        ]
    );
}

#[tokio::test]
async fn dangling_array_reference_is_dropped() {
    let fetcher = shared(
        FakeFetcher::new()
            .with("actants", json!([{ "id": "1", "universityIds": ["10", "99"] }]))
            .with("universities", json!([{ "id": "10", "name": "U1" }])),
    );
    let hydrator = Hydrator::new(fetcher, memory_store());

    let actants = hydrator.get_all(actants_plan()).await.expect("hydrated");

    assert_eq!(
        actants[0].get("universities"),
        Some(&json!([{ "id": "10", "name": "U1" }]))
    );
}

#[tokio::test]
async fn single_reference_miss_is_null() {
    let fetcher = shared(
        FakeFetcher::new()
            .with("conferences", json!([{ "id": "5", "actantId": "404" }]))
            .with("actants", json!([{ "id": "1" }])),
    );
    let hydrator = Hydrator::new(fetcher, memory_store());
    let plan = Catalog::global().get("conferences").expect("conferences plan");

    let conferences = hydrator.get_all(plan).await.expect("hydrated");

    assert_eq!(conferences[0].get("actant"), Some(&json!(null)));
    assert_eq!(conferences[0].item_type(), Some("conference"));
}

#[tokio::test]
async fn legacy_csv_resolves_like_a_clean_array() {
    let universities = json!([{ "id": "10", "name": "U1" }, { "id": "20", "name": "U2" }]);
    let csv_plan = FetchPlan::builder("actants")
        .reference(
            ReferenceSpec::array("universityIds", "universities", "universities")
                .legacy(LegacyFormat::Csv),
        )
        .build();
    let array_plan = FetchPlan::builder("actants")
        .reference(ReferenceSpec::array("universityIds", "universities", "universities"))
        .build();

    let legacy = Hydrator::new(
        shared(
            FakeFetcher::new()
                .with("actants", json!([{ "id": "1", "universityIds": "10, 20" }]))
                .with("universities", universities.clone()),
        ),
        memory_store(),
    );
    let clean = Hydrator::new(
        shared(
            FakeFetcher::new()
                .with("actants", json!([{ "id": "1", "universityIds": ["10", "20"] }]))
                .with("universities", universities),
        ),
        memory_store(),
    );

    let legacy = legacy.get_all(&csv_plan).await.expect("legacy");
    let clean = clean.get_all(&array_plan).await.expect("clean");

    assert_eq!(legacy[0].get("universities"), clean[0].get("universities"));
    assert_eq!(
        legacy[0]
            .get("universities")
            .and_then(|value| value.as_array())
            .map(Vec::len),
        Some(2)
    );
    assert_eq!(legacy[0].item_type(), Some("actants"));
}

#[tokio::test]
async fn second_read_is_served_from_cache() {
    let fetcher = shared(actants_fixture());
    let store = memory_store();
    let hydrator = Hydrator::new(fetcher.clone(), store.clone());

    let first = hydrator.get_all(actants_plan()).await.expect("first");
    let calls_after_first = fetcher.total_calls();

    let cached = store.get("actants").expect("cache entry");
    assert_eq!(cached, serde_json::to_value(&*first).expect("encode"));

    let second = hydrator.get_all(actants_plan()).await.expect("second");
    assert_eq!(first, second);
    assert_eq!(fetcher.total_calls(), calls_after_first);
}

#[tokio::test]
async fn numeric_and_string_ids_are_interchangeable() {
    let fetcher = shared(
        FakeFetcher::new().with(
            "universities",
            json!([{ "id": "10", "name": "U1" }, { "id": 20, "name": "U2" }]),
        ),
    );
    let hydrator = Hydrator::new(fetcher, memory_store());
    let plan = Catalog::global().get("universities").expect("plan");

    let by_number = hydrator
        .get_resource(plan, Some(ResourceId::from(20_u32)))
        .await
        .expect("by number")
        .into_item()
        .expect("item");
    let by_string = hydrator
        .get_resource(plan, Some(ResourceId::from("20")))
        .await
        .expect("by string")
        .into_item()
        .expect("item");
    assert_eq!(by_number, by_string);
    assert_eq!(by_number.get("name"), Some(&json!("U2")));

    let missing = hydrator
        .get_resource(plan, Some(ResourceId::from("999")))
        .await
        .expect("lookup");
    assert!(missing.is_missing());

    let everything = hydrator.get_resource(plan, None).await.expect("all");
    assert!(matches!(everything, Resource::Collection(items) if items.len() == 2));
}

#[tokio::test]
async fn failed_dependency_fails_the_call_and_caches_nothing() {
    let fetcher = shared(actants_fixture());
    fetcher.fail("universities");
    let store = memory_store();
    let hydrator = Hydrator::new(fetcher.clone(), store.clone());

    let err = hydrator
        .get_all(actants_plan())
        .await
        .expect_err("dependency failure");
    match &err {
        HydrateError::Fetch {
            collection, failed, ..
        } => {
            assert_eq!(collection, "actants");
            assert_eq!(failed, "universities");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.to_string(), "failed to load collection `actants`");
    assert!(store.get("actants").is_none());

    fetcher.heal("universities");
    let actants = hydrator.get_all(actants_plan()).await.expect("recovered");
    assert_eq!(actants.len(), 1);
    assert!(store.get("actants").is_some());
}

#[tokio::test]
async fn unreadable_cache_entry_falls_back_to_fetch() {
    let fetcher = shared(actants_fixture());
    let store = memory_store();
    store
        .set("actants", &json!({ "not": "a collection" }))
        .expect("seed");
    let hydrator = Hydrator::new(fetcher.clone(), store.clone());

    let actants = hydrator.get_all(actants_plan()).await.expect("hydrated");

    assert_eq!(actants.len(), 1);
    assert_eq!(fetcher.calls_for("actants"), 1);
    assert_eq!(
        store.get("actants"),
        Some(serde_json::to_value(&*actants).expect("encode"))
    );
}

#[tokio::test]
async fn invalidate_forces_a_refetch() {
    let fetcher = shared(actants_fixture());
    let hydrator = Hydrator::new(fetcher.clone(), memory_store());

    hydrator.get_all(actants_plan()).await.expect("first");
    hydrator.invalidate("actants");
    hydrator.get_all(actants_plan()).await.expect("second");
    assert_eq!(fetcher.calls_for("actants"), 2);

    hydrator.invalidate_all();
    hydrator.get_all(actants_plan()).await.expect("third");
    assert_eq!(fetcher.calls_for("actants"), 3);
}

#[tokio::test]
async fn disabled_cache_fetches_every_time() {
    let fetcher = shared(actants_fixture());
    let hydrator = Hydrator::new(fetcher.clone(), Arc::new(DisabledStore));

    hydrator.get_all(actants_plan()).await.expect("first");
    hydrator.get_all(actants_plan()).await.expect("second");

    assert_eq!(fetcher.calls_for("actants"), 2);
}

#[tokio::test]
async fn people_references_union_actants_and_students() {
    let fetcher = shared(
        FakeFetcher::new()
            .with(
                "works",
                json!([{ "id": "w1", "contributorIds": ["s1", "a1", "s1"], "keywordIds": "k1,k2" }]),
            )
            .with("actants", json!([{ "id": "a1", "name": "Ada" }]))
            .with("students", json!([{ "id": "s1", "name": "Sam" }]))
            .with("keywords", json!([{ "id": "k2", "label": "art" }])),
    );
    let resources = Resources::new(Hydrator::new(fetcher, memory_store()));

    let work = resources.work("w1").await.expect("load").expect("work w1");

    assert_eq!(
        work.get("contributors"),
        Some(&json!([{ "id": "s1", "name": "Sam" }, { "id": "a1", "name": "Ada" }]))
    );
    assert_eq!(work.get("keywords"), Some(&json!([{ "id": "k2", "label": "art" }])));
    assert_eq!(work.item_type(), Some("work"));
}

#[tokio::test]
async fn unknown_collection_is_reported() {
    let resources = Resources::new(Hydrator::new(shared(FakeFetcher::new()), memory_store()));

    let err = resources.all("dragons").await.expect_err("unknown");
    assert!(matches!(err, HydrateError::UnknownCollection { .. }));
}

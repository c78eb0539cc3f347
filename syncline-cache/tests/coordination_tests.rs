//! End-to-end coordination behavior: shared fetches, propagation after
//! mutations, optimistic rollback, staleness rejection, and retry.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use syncline_cache::{
    CacheConfig, CacheContext, MutateOptions, MutateOverrides, ObserveOptions, OptimisticData,
    ResourceMutator, ResourceObserver,
};
use syncline_core::ResourceKey;
use syncline_test_utils::{
    appended, item, item_list, ControlledFetcher, ControlledPoster, FailingPoster, FlakyFetcher,
    QueryParams, ScriptedFetcher, ScriptedPoster, StaticFetcher, SynclineError,
};

fn test_context() -> Arc<CacheContext> {
    Arc::new(CacheContext::new(
        CacheConfig::new().with_retry_delay(Duration::from_millis(20)),
    ))
}

#[tokio::test]
async fn refresh_with_no_registrants_is_a_noop() {
    let ctx = test_context();
    ctx.refresh(&ResourceKey::new("/items")).await;
}

#[tokio::test]
async fn observe_fetches_and_publishes_data() {
    let ctx = test_context();
    let fetcher = Arc::new(StaticFetcher::new(item_list(2)));

    let observer = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()),
    )
    .await;

    let state = observer.state().expect("state");
    assert_eq!(state.data, Some(item_list(2)));
    assert!(!state.is_loading);
    assert!(state.error.is_none());
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn reattaching_with_unchanged_data_does_not_refetch() {
    let ctx = test_context();
    let fetcher = Arc::new(StaticFetcher::new(item_list(1)));

    let observer = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()),
    )
    .await;
    assert_eq!(fetcher.calls(), 1);

    observer.attach().await;
    observer.attach().await;
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn later_started_trigger_wins_when_it_completes_first() {
    let ctx = test_context();
    let fetcher = Arc::new(ControlledFetcher::new());

    let mounting = tokio::spawn(ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()),
    ));
    fetcher.wait_for_pending(1).await;
    assert!(fetcher.resolve(0, Ok(item(0))));
    let observer = mounting.await.expect("observe task");
    assert_eq!(observer.state().expect("state").data, Some(item(0)));

    // Two overlapping triggers for the same instance+key.
    let first = tokio::spawn({
        let observer = observer.clone();
        async move { observer.trigger().await }
    });
    fetcher.wait_for_pending(1).await;
    let second = tokio::spawn({
        let observer = observer.clone();
        async move { observer.trigger().await }
    });
    fetcher.wait_for_pending(2).await;

    // The newer trigger completes first, then the older one lands late.
    assert!(fetcher.resolve(1, Ok(json!("newer"))));
    second.await.expect("second trigger");
    assert!(fetcher.resolve(0, Ok(json!("older"))));
    first.await.expect("first trigger");

    assert_eq!(observer.state().expect("state").data, Some(json!("newer")));
}

#[tokio::test]
async fn later_started_trigger_wins_when_it_completes_last() {
    let ctx = test_context();
    let fetcher = Arc::new(ControlledFetcher::new());

    let mounting = tokio::spawn(ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()),
    ));
    fetcher.wait_for_pending(1).await;
    assert!(fetcher.resolve(0, Ok(item(0))));
    let observer = mounting.await.expect("observe task");

    let first = tokio::spawn({
        let observer = observer.clone();
        async move { observer.trigger().await }
    });
    fetcher.wait_for_pending(1).await;
    let second = tokio::spawn({
        let observer = observer.clone();
        async move { observer.trigger().await }
    });
    fetcher.wait_for_pending(2).await;

    // The older trigger completes first: its commit is discarded because
    // the newer epoch already superseded it.
    assert!(fetcher.resolve(0, Ok(json!("older"))));
    first.await.expect("first trigger");
    assert_eq!(observer.state().expect("state").data, Some(item(0)));

    assert!(fetcher.resolve(0, Ok(json!("newer"))));
    second.await.expect("second trigger");
    assert_eq!(observer.state().expect("state").data, Some(json!("newer")));
}

#[tokio::test]
async fn clear_all_restores_first_observation_behavior() {
    let ctx = test_context();
    let fetcher = Arc::new(StaticFetcher::new(item_list(1)));

    let first = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()).keep_previous_data(true),
    )
    .await;
    let first_state = first.state().expect("state");
    assert_eq!(fetcher.calls(), 1);

    ctx.clear_all().await;

    // No seed survives the clear: the second observation fetches afresh,
    // exactly like the very first one did.
    let second = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()).keep_previous_data(true),
    )
    .await;
    let second_state = second.state().expect("state");
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(second_state.data, first_state.data);
    assert_eq!(second_state.is_loading, first_state.is_loading);
}

#[tokio::test]
async fn refresh_retriggers_every_subscriber() {
    let ctx = test_context();
    let fetcher = Arc::new(StaticFetcher::new(item_list(1)));

    let _a = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()),
    )
    .await;
    let _b = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()),
    )
    .await;
    assert_eq!(fetcher.calls(), 2);

    ctx.refresh(&ResourceKey::new("/items")).await;
    assert_eq!(fetcher.calls(), 4);
}

// Scenario A: a mutation with use_response_data unset forces a genuine
// re-fetch of the related read resource.
#[tokio::test]
async fn successful_post_refetches_related_read_key() {
    let ctx = test_context();
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        Ok(json!([])),
        Ok(json!(["x"])),
    ]));

    let observer = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()),
    )
    .await;
    assert_eq!(observer.state().expect("state").data, Some(json!([])));

    let poster = Arc::new(ScriptedPoster::new(vec![Ok(json!({"created": "x"}))]));
    let mutator = ResourceMutator::mutate(
        Arc::clone(&ctx),
        "/items",
        MutateOptions::new(poster.clone()).related_read_address("/items"),
    );
    mutator.post(Some(json!({"name": "x"})), None).await;

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(observer.state().expect("state").data, Some(json!(["x"])));

    let mutate_state = mutator.state().expect("state");
    assert_eq!(mutate_state.data, Some(json!({"created": "x"})));
    assert!(!mutate_state.is_posting);
    assert!(mutate_state.error.is_none());
    assert_eq!(poster.bodies(), vec![Some(json!({"name": "x"}))]);
}

// Scenario B: optimistic append is visible while the post is in flight and
// rolls back to each instance's own snapshot when the post fails.
#[tokio::test]
async fn failed_optimistic_post_rolls_back_to_confirmed_snapshots() {
    let ctx = test_context();
    let fetcher = Arc::new(StaticFetcher::new(json!(["a"])));

    let observer = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()),
    )
    .await;

    let poster = Arc::new(ControlledPoster::new());
    let mutator = ResourceMutator::mutate(
        Arc::clone(&ctx),
        "/items",
        MutateOptions::new(poster.clone())
            .related_read_address("/items")
            .optimistic(OptimisticData::Updater(Arc::new(|previous, body| {
                appended(
                    previous,
                    body.cloned().unwrap_or_else(|| json!("missing")),
                )
            }))),
    );

    // Confirm one post so the mutator has a rollback snapshot.
    let confirming = tokio::spawn({
        let mutator = mutator.clone();
        async move { mutator.post(Some(json!("a")), None).await }
    });
    poster.wait_for_pending(1).await;
    assert!(poster.resolve(0, Ok(json!(["a"]))));
    confirming.await.expect("confirming post");
    assert_eq!(mutator.state().expect("state").data, Some(json!(["a"])));

    // Second post: optimistic value appears everywhere before resolution.
    let failing = tokio::spawn({
        let mutator = mutator.clone();
        async move { mutator.post(Some(json!("b")), None).await }
    });
    poster.wait_for_pending(1).await;
    assert_eq!(
        mutator.state().expect("state").data,
        Some(json!(["a", "b"]))
    );
    assert_eq!(
        observer.state().expect("state").data,
        Some(json!(["a", "b"]))
    );

    assert!(poster.resolve(0, Err(SynclineError::transport("/items", "rejected"))));
    failing.await.expect("failing post");

    // Mutator reverts to its confirmed response, the observer to its own
    // cached fetch result.
    let mutate_state = mutator.state().expect("state");
    assert_eq!(mutate_state.data, Some(json!(["a"])));
    assert!(mutate_state.error.is_some());
    assert_eq!(observer.state().expect("state").data, Some(json!(["a"])));
}

// Open question resolved in DESIGN.md: a first-ever optimistic update with
// no confirmed snapshot stays in place after a failed post.
#[tokio::test]
async fn failed_optimistic_post_without_snapshot_keeps_optimistic_value() {
    let ctx = test_context();
    let poster = Arc::new(FailingPoster::new("rejected"));
    let mutator = ResourceMutator::mutate(
        Arc::clone(&ctx),
        "/items",
        MutateOptions::new(poster.clone())
            .optimistic(OptimisticData::Value(json!(["first"]))),
    );
    mutator.post(None, None).await;

    assert_eq!(poster.calls(), 1);
    let state = mutator.state().expect("state");
    assert_eq!(state.data, Some(json!(["first"])));
    assert!(state.error.is_some());
}

// Scenario C: use_response_data pushes the response to every subscriber
// and overwrites the shared cache without issuing any fetch.
#[tokio::test]
async fn response_data_propagates_without_refetch() {
    let ctx = test_context();
    let fetcher = Arc::new(StaticFetcher::new(json!(["a"])));

    let first = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()),
    )
    .await;
    let second = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()),
    )
    .await;
    assert_eq!(fetcher.calls(), 2);

    let poster = Arc::new(ScriptedPoster::new(vec![Ok(json!(["a", "b"]))]));
    let mutator = ResourceMutator::mutate(
        Arc::clone(&ctx),
        "/items",
        MutateOptions::new(poster)
            .related_read_address("/items")
            .use_response_data(true),
    );
    mutator.post(Some(json!("b")), None).await;

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(first.state().expect("state").data, Some(json!(["a", "b"])));
    assert_eq!(second.state().expect("state").data, Some(json!(["a", "b"])));

    // The cache entries were overwritten too: a late-mounting observer
    // seeds from the response without fetching.
    let late = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()).keep_previous_data(true),
    )
    .await;
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(late.state().expect("state").data, Some(json!(["a", "b"])));
}

// Scenario D: a failing read with no data keeps retrying at the configured
// interval until the fetch succeeds.
#[tokio::test]
async fn failing_read_retries_until_success() {
    let ctx = test_context();
    let fetcher = Arc::new(FlakyFetcher::new(2, item_list(1)));

    let observer = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()),
    )
    .await;

    let state = observer.state().expect("state");
    assert!(state.data.is_none());
    assert!(state.error.is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;

    let state = observer.state().expect("state");
    assert_eq!(state.data, Some(item_list(1)));
    assert!(state.error.is_none());
    assert_eq!(fetcher.calls(), 3);
}

// Scenario E: a second observer mounted after the first resolves renders
// the cached value on its very first snapshot, with no loading flash.
#[tokio::test]
async fn keep_previous_data_seeds_from_another_instance() {
    let ctx = test_context();
    let fetcher = Arc::new(StaticFetcher::new(item_list(3)));

    let _first = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()),
    )
    .await;
    assert_eq!(fetcher.calls(), 1);

    let second = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()).keep_previous_data(true),
    )
    .await;

    let state = second.state().expect("state");
    assert_eq!(state.data, Some(item_list(3)));
    assert!(!state.is_loading);
    assert_eq!(fetcher.calls(), 1);
}

// Distinct query parameters produce distinct keys: observers of the same
// address with different params never share state.
#[tokio::test]
async fn query_params_scope_the_resource_key() {
    let ctx = test_context();
    let page_one = Arc::new(StaticFetcher::new(json!(["p1"])));
    let page_two = Arc::new(StaticFetcher::new(json!(["p2"])));

    let first = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(page_one.clone())
            .query(QueryParams::new().with("page", "1")),
    )
    .await;
    let second = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(page_two.clone())
            .query(QueryParams::new().with("page", "2")),
    )
    .await;

    assert_ne!(first.key(), second.key());
    assert_eq!(first.state().expect("state").data, Some(json!(["p1"])));
    assert_eq!(second.state().expect("state").data, Some(json!(["p2"])));

    // Refreshing page 1 leaves page 2 untouched.
    ctx.refresh(first.key()).await;
    assert_eq!(page_one.calls(), 2);
    assert_eq!(page_two.calls(), 1);
}

// Per-call overrides replace the hook-level defaults for that call only.
#[tokio::test]
async fn per_call_overrides_replace_defaults() {
    let ctx = test_context();
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        Ok(json!([])),
        Ok(json!(["x"])),
    ]));
    let observer = ResourceObserver::observe(
        Arc::clone(&ctx),
        "/items",
        ObserveOptions::new(fetcher.clone()),
    )
    .await;

    let poster = Arc::new(ScriptedPoster::new(vec![Ok(json!("done"))]));
    // No related read key by default.
    let mutator =
        ResourceMutator::mutate(Arc::clone(&ctx), "/items", MutateOptions::new(poster));

    mutator
        .post(
            None,
            Some(MutateOverrides {
                related_read_address: Some("/items".to_string()),
                ..Default::default()
            }),
        )
        .await;

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(observer.state().expect("state").data, Some(json!(["x"])));
}

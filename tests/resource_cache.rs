//! End-to-end behaviour of the keyed resource cache: single-flight creation,
//! sliding expiry, and failure capture, driven by counting producers.

use futures::future::join_all;
use pokecache::{CacheConfig, KeyedResourceCache, PollableResource, Polled};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Barrier, oneshot};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pokemon {0:?} not found")]
struct NotFoundError(String);

type JsonCache = KeyedResourceCache<String, Value, NotFoundError>;

#[tokio::test(start_paused = true)]
async fn pikachu_resolves_then_expires() {
    let cache = JsonCache::new(CacheConfig::new(Duration::from_secs(5))).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let (release, released) = oneshot::channel::<()>();

    let r1 = cache
        .get("pikachu".to_owned(), {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    let _ = released.await;
                    Ok(json!({ "name": "pikachu" }))
                }
            }
        })
        .unwrap();
    assert_eq!(r1.poll(), Polled::NotReady);

    release.send(()).unwrap();
    r1.settled().await;
    assert_eq!(r1.poll(), Polled::Ready(&json!({ "name": "pikachu" })));

    tokio::time::sleep(Duration::from_secs(6)).await;

    let r2 = cache
        .get("pikachu".to_owned(), {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!({ "name": "pikachu" })) }
            }
        })
        .unwrap();
    assert!(!PollableResource::ptr_eq(&r1, &r2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_gets_share_one_producer_call() {
    let cache = Arc::new(JsonCache::new(CacheConfig::new(Duration::from_secs(60))).unwrap());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(50));

    let handles = (0..50).map(|_| {
        let cache = cache.clone();
        let calls = calls.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            cache
                .get("bulbasaur".to_owned(), move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(json!({ "name": "bulbasaur" }))
                    }
                })
                .unwrap()
        })
    });

    let resources: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(
        resources
            .iter()
            .all(|r| PollableResource::ptr_eq(r, &resources[0]))
    );

    resources[0].settled().await;
    assert!(resources.iter().all(|r| r.poll().is_ready()));
}

#[tokio::test]
async fn rejection_is_stable_across_polls() {
    let cache = JsonCache::new(CacheConfig::new(Duration::from_secs(5))).unwrap();

    let resource = cache
        .get("missingno".to_owned(), || async {
            Err(NotFoundError("missingno".to_owned()))
        })
        .unwrap();
    resource.settled().await;

    for _ in 0..5 {
        match resource.poll() {
            Polled::Failed(failure) => {
                assert_eq!(
                    failure.producer_error(),
                    Some(&NotFoundError("missingno".to_owned()))
                );
                assert_eq!(failure.to_string(), r#"pokemon "missingno" not found"#);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn failed_resource_is_not_retried_until_invalidated() {
    let cache = JsonCache::new(CacheConfig::new(Duration::from_secs(5))).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let failing = |calls: &Arc<AtomicUsize>| {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(NotFoundError("mew".to_owned())) }
        }
    };

    let first = cache.get("mew".to_owned(), failing(&calls)).unwrap();
    first.settled().await;
    let again = cache.get("mew".to_owned(), failing(&calls)).unwrap();
    assert!(PollableResource::ptr_eq(&first, &again));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(cache.invalidate("mew"), Ok(true));
    let retried = cache.get("mew".to_owned(), failing(&calls)).unwrap();
    assert!(!PollableResource::ptr_eq(&first, &retried));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

//! The six cache policies through the public client surface.

use backstop::{
    CachePolicy, Client, ClientConfig, DeliverySource, RequestDescriptor, RequestError,
    TransportError, TransportErrorKind, TransportRequest, TransportResponse, cache_key,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tower::ServiceExt;
use tower::util::BoxCloneService;

type Transport = BoxCloneService<TransportRequest, TransportResponse, TransportError>;

fn serving(calls: Arc<AtomicUsize>, payload: &'static [u8]) -> Transport {
    tower::service_fn(move |_req: TransportRequest| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TransportError>(TransportResponse::new(200, payload.to_vec()))
        }
    })
    .boxed_clone()
}

fn failing(calls: Arc<AtomicUsize>) -> Transport {
    tower::service_fn(move |_req: TransportRequest| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<TransportResponse, _>(TransportError::new(
                TransportErrorKind::ConnectionLost,
                "down",
            ))
        }
    })
    .boxed_clone()
}

fn client(transport: Transport) -> Client<Transport> {
    Client::new(ClientConfig::builder("https://api.test").build(), transport)
}

/// Key for a parameter-less GET of `path`, matching the executor's
/// derivation (primary host + path).
fn key_for(path: &str) -> String {
    cache_key(&format!("https://api.test{path}"), &BTreeMap::new())
}

#[tokio::test]
async fn cache_only_miss_never_touches_network() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = client(serving(Arc::clone(&calls), b"net"));

    let err = client
        .submit(
            RequestDescriptor::get("/users")
                .cache_policy(CachePolicy::CacheOnly)
                .build(),
        )
        .finish()
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::CacheMiss));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cache_only_serves_valid_entry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = client(serving(Arc::clone(&calls), b"net"));
    client
        .cache()
        .put(&key_for("/users"), b"stored".to_vec(), Duration::ZERO);

    let delivery = client
        .submit(
            RequestDescriptor::get("/users")
                .cache_policy(CachePolicy::CacheOnly)
                .build(),
        )
        .finish()
        .await
        .unwrap();

    assert_eq!(delivery.payload, b"stored");
    assert_eq!(delivery.source, DeliverySource::Cache);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn network_only_writes_but_never_reads() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = client(serving(Arc::clone(&calls), b"fresh"));
    // A pre-existing entry must be ignored on the read side...
    client
        .cache()
        .put(&key_for("/users"), b"stale".to_vec(), Duration::ZERO);

    let delivery = client
        .submit(
            RequestDescriptor::get("/users")
                .cache_policy(CachePolicy::NetworkOnly)
                .build(),
        )
        .finish()
        .await
        .unwrap();
    assert_eq!(delivery.payload, b"fresh");
    assert_eq!(delivery.source, DeliverySource::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // ...but the result overwrites it.
    let entry = client.cache().get(&key_for("/users")).unwrap();
    assert_eq!(entry.payload, b"fresh");
}

#[tokio::test]
async fn cache_else_network_prefers_valid_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = client(serving(Arc::clone(&calls), b"net"));

    let descriptor = || {
        RequestDescriptor::get("/users")
            .cache_policy(CachePolicy::CacheElseNetwork)
            .build()
    };

    // Cold: network, cached on the way out.
    let first = client.submit(descriptor()).finish().await.unwrap();
    assert_eq!(first.source, DeliverySource::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Warm: cache, no second network call.
    let second = client.submit(descriptor()).finish().await.unwrap();
    assert_eq!(second.source, DeliverySource::Cache);
    assert_eq!(second.payload, b"net");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn network_else_cache_falls_back_on_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = client(failing(Arc::clone(&calls)));
    client
        .cache()
        .put(&key_for("/users"), b"last good".to_vec(), Duration::ZERO);

    let delivery = client
        .submit(
            RequestDescriptor::get("/users")
                .cache_policy(CachePolicy::NetworkElseCache)
                .build(),
        )
        .finish()
        .await
        .unwrap();

    assert_eq!(delivery.payload, b"last good");
    assert_eq!(delivery.source, DeliverySource::Cache);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn network_else_cache_propagates_error_on_empty_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = client(failing(Arc::clone(&calls)));

    let err = client
        .submit(
            RequestDescriptor::get("/users")
                .cache_policy(CachePolicy::NetworkElseCache)
                .build(),
        )
        .finish()
        .await
        .unwrap_err();

    // The original network failure surfaces, not a cache miss.
    assert!(matches!(err, RequestError::Transport(_)));
}

#[tokio::test]
async fn cache_then_network_delivers_twice_with_source_tags() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = client(serving(Arc::clone(&calls), b"fresh"));
    client
        .cache()
        .put(&key_for("/feed"), b"stale".to_vec(), Duration::ZERO);

    let mut handle = client.submit(
        RequestDescriptor::get("/feed")
            .cache_policy(CachePolicy::CacheThenNetwork)
            .build(),
    );

    let first = handle.next().await.unwrap().unwrap();
    assert_eq!(first.source, DeliverySource::Cache);
    assert_eq!(first.payload, b"stale");

    let second = handle.next().await.unwrap().unwrap();
    assert_eq!(second.source, DeliverySource::Network);
    assert_eq!(second.payload, b"fresh");

    assert!(handle.next().await.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cache_then_network_with_cold_cache_delivers_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = client(serving(Arc::clone(&calls), b"fresh"));

    let mut handle = client.submit(
        RequestDescriptor::get("/feed")
            .cache_policy(CachePolicy::CacheThenNetwork)
            .build(),
    );

    let only = handle.next().await.unwrap().unwrap();
    assert_eq!(only.source, DeliverySource::Network);
    assert!(handle.next().await.is_none());
}

#[tokio::test]
async fn finish_resolves_to_the_network_outcome() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = client(failing(Arc::clone(&calls)));
    client
        .cache()
        .put(&key_for("/feed"), b"stale".to_vec(), Duration::ZERO);

    // CacheThenNetwork delivered the cached payload first, but the
    // terminal outcome is the network failure.
    let err = client
        .submit(
            RequestDescriptor::get("/feed")
                .cache_policy(CachePolicy::CacheThenNetwork)
                .build(),
        )
        .finish()
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::Transport(_)));
}

#[tokio::test]
async fn expired_entries_are_not_served() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = client(serving(Arc::clone(&calls), b"net"));
    client
        .cache()
        .put(&key_for("/users"), b"old".to_vec(), Duration::from_millis(30));

    sleep(Duration::from_millis(45)).await;
    let err = client
        .submit(
            RequestDescriptor::get("/users")
                .cache_policy(CachePolicy::CacheOnly)
                .build(),
        )
        .finish()
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::CacheMiss));
}

#[tokio::test]
async fn descriptor_max_age_governs_written_entries() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = client(serving(Arc::clone(&calls), b"net"));

    let descriptor = || {
        RequestDescriptor::get("/users")
            .cache_policy(CachePolicy::CacheElseNetwork)
            .cache_max_age(Duration::from_millis(30))
            .build()
    };

    let _ = client.submit(descriptor()).finish().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Within the window the entry is served...
    let warm = client.submit(descriptor()).finish().await.unwrap();
    assert_eq!(warm.source, DeliverySource::Cache);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // ...after it, the network is consulted again.
    sleep(Duration::from_millis(45)).await;
    let refetched = client.submit(descriptor()).finish().await.unwrap();
    assert_eq!(refetched.source, DeliverySource::Network);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn policy_none_skips_the_cache_entirely() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = client(serving(Arc::clone(&calls), b"net"));

    let _ = client
        .submit(RequestDescriptor::get("/users").build())
        .finish()
        .await
        .unwrap();

    assert!(client.cache().get(&key_for("/users")).is_none());
    assert_eq!(client.cache().memory_len(), 0);
}

#[tokio::test]
async fn identical_requests_with_permuted_params_share_an_entry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = client(serving(Arc::clone(&calls), b"net"));

    let first = client
        .submit(
            RequestDescriptor::get("/search")
                .cache_policy(CachePolicy::CacheElseNetwork)
                .param("q", "rust")
                .param("page", "1")
                .build(),
        )
        .finish()
        .await
        .unwrap();
    assert_eq!(first.source, DeliverySource::Network);

    // Same pairs, inserted in the opposite order.
    let second = client
        .submit(
            RequestDescriptor::get("/search")
                .cache_policy(CachePolicy::CacheElseNetwork)
                .param("page", "1")
                .param("q", "rust")
                .build(),
        )
        .finish()
        .await
        .unwrap();
    assert_eq!(second.source, DeliverySource::Cache);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

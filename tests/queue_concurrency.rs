//! Bounded-concurrency dispatch through the public client surface.

use backstop::{
    Client, ClientConfig, Discipline, Priority, RequestDescriptor, RequestError, TransportError,
    TransportRequest, TransportResponse,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tower::ServiceExt;
use tower::util::BoxCloneService;

type Transport = BoxCloneService<TransportRequest, TransportResponse, TransportError>;

/// A transport whose calls park until the gate is opened, recording the
/// order in which requests reach it.
fn gated(
    gate: watch::Receiver<bool>,
    started: Arc<AtomicUsize>,
    order: Arc<Mutex<Vec<String>>>,
) -> Transport {
    tower::service_fn(move |req: TransportRequest| {
        let mut gate = gate.clone();
        let started = Arc::clone(&started);
        let order = Arc::clone(&order);
        async move {
            started.fetch_add(1, Ordering::SeqCst);
            order.lock().unwrap().push(req.url);
            while !*gate.borrow() {
                if gate.changed().await.is_err() {
                    break;
                }
            }
            Ok::<_, TransportError>(TransportResponse::new(200, b"done".to_vec()))
        }
    })
    .boxed_clone()
}

#[tokio::test]
async fn concurrency_budget_caps_running_requests() {
    let (open, gate) = watch::channel(false);
    let started = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::new()));

    let config = ClientConfig::builder("https://api.test")
        .max_concurrent(5)
        .build();
    let client = Client::new(config, gated(gate, Arc::clone(&started), order));

    let mut handles = Vec::new();
    for i in 0..8 {
        handles.push(client.submit(RequestDescriptor::get(format!("/job/{i}")).build()));
    }
    sleep(Duration::from_millis(30)).await;

    // Exactly five reached the transport; three are parked.
    assert_eq!(started.load(Ordering::SeqCst), 5);
    assert_eq!(client.queue().running_len(), 5);
    assert_eq!(client.queue().pending_len(), 3);

    open.send(true).unwrap();
    for handle in handles {
        handle.finish().await.unwrap();
    }
    assert_eq!(started.load(Ordering::SeqCst), 8);
    // The queue's completion bookkeeping runs just after the delivery.
    sleep(Duration::from_millis(20)).await;
    assert_eq!(client.queue().running_len(), 0);
}

#[tokio::test]
async fn priority_discipline_orders_parked_requests() {
    let (open, gate) = watch::channel(false);
    let started = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::new()));

    let config = ClientConfig::builder("https://api.test")
        .max_concurrent(1)
        .discipline(Discipline::Priority)
        .build();
    let client = Client::new(
        config,
        gated(gate, Arc::clone(&started), Arc::clone(&order)),
    );

    let mut handles = vec![client.submit(RequestDescriptor::get("/blocker").build())];
    sleep(Duration::from_millis(20)).await;

    for (path, priority) in [
        ("/low", Priority::Low),
        ("/normal", Priority::Normal),
        ("/critical", Priority::Critical),
        ("/high", Priority::High),
    ] {
        handles.push(client.submit(RequestDescriptor::get(path).priority(priority).build()));
    }

    open.send(true).unwrap();
    for handle in handles {
        handle.finish().await.unwrap();
    }

    let order = order.lock().unwrap();
    assert_eq!(
        *order,
        vec![
            "https://api.test/blocker",
            "https://api.test/critical",
            "https://api.test/high",
            "https://api.test/normal",
            "https://api.test/low",
        ]
    );
}

#[tokio::test]
async fn raising_the_budget_drains_parked_requests() {
    let (open, gate) = watch::channel(false);
    let started = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::new()));

    let config = ClientConfig::builder("https://api.test")
        .max_concurrent(1)
        .build();
    let client = Client::new(config, gated(gate, Arc::clone(&started), order));

    let mut handles = Vec::new();
    for i in 0..4 {
        handles.push(client.submit(RequestDescriptor::get(format!("/job/{i}")).build()));
    }
    sleep(Duration::from_millis(20)).await;
    assert_eq!(started.load(Ordering::SeqCst), 1);

    client.set_max_concurrent(4);
    sleep(Duration::from_millis(20)).await;
    assert_eq!(started.load(Ordering::SeqCst), 4);

    open.send(true).unwrap();
    for handle in handles {
        handle.finish().await.unwrap();
    }
}

#[tokio::test]
async fn cancel_all_resolves_parked_requests_as_cancelled() {
    let (_open, gate) = watch::channel(false);
    let started = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::new()));

    let config = ClientConfig::builder("https://api.test")
        .max_concurrent(1)
        .build();
    let client = Client::new(config, gated(gate, Arc::clone(&started), order));

    let running = client.submit(RequestDescriptor::get("/running").build());
    let parked = client.submit(RequestDescriptor::get("/parked").build());
    sleep(Duration::from_millis(20)).await;
    assert_eq!(started.load(Ordering::SeqCst), 1);

    client.cancel_all();

    let err = parked.finish().await.unwrap_err();
    assert!(matches!(err, RequestError::Cancelled));
    let err = running.finish().await.unwrap_err();
    assert!(matches!(err, RequestError::Cancelled));

    // The parked request never reached the transport.
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(client.queue().pending_len(), 0);
}

#[tokio::test]
async fn cancelling_a_parked_request_skips_its_execution() {
    let (open, gate) = watch::channel(false);
    let started = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::new()));

    let config = ClientConfig::builder("https://api.test")
        .max_concurrent(1)
        .build();
    let client = Client::new(config, gated(gate, Arc::clone(&started), order));

    let blocker = client.submit(RequestDescriptor::get("/blocker").build());
    let mut parked = client.submit(RequestDescriptor::get("/parked").build());
    sleep(Duration::from_millis(20)).await;

    parked.cancel();
    open.send(true).unwrap();
    blocker.finish().await.unwrap();

    let err = parked.finish().await.unwrap_err();
    assert!(matches!(err, RequestError::Cancelled));
    // Only the blocker ever reached the transport.
    sleep(Duration::from_millis(20)).await;
    assert_eq!(started.load(Ordering::SeqCst), 1);
}

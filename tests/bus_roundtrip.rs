//! Publish/subscribe behavior over the in-memory broker: delivery
//! equality, group semantics, malformed-record isolation, handler
//! failure isolation, and cancellation.

use std::collections::HashSet;
use std::time::Duration;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use swarmlink::bus::{Broker, HandlerError, InMemoryBroker, Publisher, Subscriber};
use swarmlink::types::{decode, Envelope, Objective};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn objective(id: &str) -> Objective {
    Objective {
        id: id.to_string(),
        description: format!("objective {id}"),
    }
}

async fn recv_one<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("channel closed")
}

#[tokio::test]
async fn published_record_reaches_matching_handler_once() {
    let broker = InMemoryBroker::new();
    let publisher = Publisher::new(broker.clone());
    let subscriber = Subscriber::new(broker).with_poll_timeout(Duration::from_millis(20));

    let sent = objective("OBJ-1");
    publisher.send("objectives", &sent).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        subscriber
            .run("objectives", "planner-group", loop_cancel, move |record: Objective| {
                let tx = tx.clone();
                async move {
                    tx.send(record).expect("collector closed");
                    Ok::<(), HandlerError>(())
                }
            })
            .await
    });

    let received = recv_one(&mut rx).await;
    assert_eq!(received, sent);

    // No duplicate delivery within the group.
    let extra = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(extra.is_err(), "unexpected duplicate delivery: {extra:?}");

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn group_members_split_records_without_duplicates() {
    let broker = InMemoryBroker::new();
    let publisher = Publisher::new(broker.clone());

    let total = 10;
    for i in 0..total {
        publisher
            .send("objectives", &objective(&format!("OBJ-{i}")))
            .await
            .unwrap();
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let mut handles = Vec::new();
    for _ in 0..2 {
        let subscriber =
            Subscriber::new(broker.clone()).with_poll_timeout(Duration::from_millis(20));
        let tx = tx.clone();
        let loop_cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            subscriber
                .run("objectives", "shared-group", loop_cancel, move |record: Objective| {
                    let tx = tx.clone();
                    async move {
                        tx.send(record.id).expect("collector closed");
                        Ok::<(), HandlerError>(())
                    }
                })
                .await
        }));
    }
    drop(tx);

    let mut seen = Vec::new();
    for _ in 0..total {
        seen.push(recv_one(&mut rx).await);
    }
    let unique: HashSet<_> = seen.iter().cloned().collect();
    assert_eq!(unique.len(), total, "duplicate deliveries within one group");
    for i in 0..total {
        assert!(unique.contains(&format!("OBJ-{i}")));
    }

    cancel.cancel();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn malformed_record_is_skipped_and_loop_continues() {
    let broker = InMemoryBroker::new();

    // Raw garbage straight onto the topic, bypassing the typed publisher.
    broker
        .publish(Envelope::new("objectives", b"\x00\x01 garbage".to_vec()))
        .await
        .unwrap();
    // Valid JSON of the wrong shape.
    broker
        .publish(Envelope::new("objectives", br#"{"id": 42}"#.to_vec()))
        .await
        .unwrap();

    let publisher = Publisher::new(broker.clone());
    let sent = objective("OBJ-OK");
    publisher.send("objectives", &sent).await.unwrap();

    let subscriber = Subscriber::new(broker).with_poll_timeout(Duration::from_millis(20));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        subscriber
            .run("objectives", "g", loop_cancel, move |record: Objective| {
                let tx = tx.clone();
                async move {
                    tx.send(record).expect("collector closed");
                    Ok::<(), HandlerError>(())
                }
            })
            .await
    });

    // The only dispatched record is the valid one, proving the loop
    // survived both bad payloads that preceded it.
    let received = recv_one(&mut rx).await;
    assert_eq!(received, sent);

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn handler_failure_does_not_halt_the_loop() {
    let broker = InMemoryBroker::new();
    let publisher = Publisher::new(broker.clone());
    publisher.send("objectives", &objective("OBJ-1")).await.unwrap();
    publisher.send("objectives", &objective("OBJ-2")).await.unwrap();

    let subscriber = Subscriber::new(broker).with_poll_timeout(Duration::from_millis(20));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        subscriber
            .run("objectives", "g", loop_cancel, move |record: Objective| {
                let tx = tx.clone();
                async move {
                    tx.send(record.id.clone()).expect("collector closed");
                    if record.id == "OBJ-1" {
                        return Err::<(), HandlerError>("simulated handler failure".into());
                    }
                    Ok(())
                }
            })
            .await
    });

    assert_eq!(recv_one(&mut rx).await, "OBJ-1");
    // The failure on OBJ-1 must not stop OBJ-2 from being dispatched.
    assert_eq!(recv_one(&mut rx).await, "OBJ-2");

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn cancellation_exits_cleanly_without_error() {
    let subscriber =
        Subscriber::new(InMemoryBroker::new()).with_poll_timeout(Duration::from_millis(20));
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        subscriber
            .run("objectives", "g", loop_cancel, |_record: Objective| async move {
                Ok::<(), HandlerError>(())
            })
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop did not observe cancellation")
        .unwrap();
    assert!(result.is_ok(), "cancellation must not surface as an error");
}

proptest! {
    /// Arbitrary bytes never panic the deserialize step; they decode or
    /// they fail, and either way the subscriber loop can carry on.
    #[test]
    fn decode_arbitrary_bytes_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode::<Objective>(&bytes);
    }
}

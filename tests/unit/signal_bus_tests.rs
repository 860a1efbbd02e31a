use std::time::Duration;

use serde_json::json;

use agent_ensemble::backend::signals::{BackendSignal, SignalBus, SignalSource};
use agent_ensemble::AppError;

fn output(session_id: &str) -> BackendSignal {
    BackendSignal::AgentOutput {
        session_id: session_id.into(),
        record_kind: "assistant".into(),
        payload: json!({}),
    }
}

#[tokio::test]
async fn subscribers_receive_signals_in_order() {
    let bus = SignalBus::new();
    let mut rx = bus.subscribe().unwrap();

    bus.publish(output("s1")).await;
    bus.publish(BackendSignal::SessionCancelled {
        session_id: "s1".into(),
    })
    .await;

    assert_eq!(rx.recv().await.unwrap(), output("s1"));
    assert_eq!(rx.recv().await.unwrap().session_id(), "s1");
}

#[tokio::test]
async fn every_subscriber_gets_every_signal() {
    let bus = SignalBus::new();
    let mut first = bus.subscribe().unwrap();
    let mut second = bus.subscribe().unwrap();

    assert_eq!(bus.publish(output("s1")).await, 2);

    assert_eq!(first.recv().await.unwrap(), output("s1"));
    assert_eq!(second.recv().await.unwrap(), output("s1"));
}

#[tokio::test]
async fn publish_without_subscribers_is_dropped() {
    let bus = SignalBus::new();

    assert_eq!(bus.publish(output("s1")).await, 0);
}

#[tokio::test(start_paused = true)]
async fn full_queue_makes_publisher_wait_instead_of_dropping() {
    let bus = SignalBus::with_capacity(2);
    let mut rx = bus.subscribe().unwrap();

    bus.publish(output("s1")).await;
    bus.publish(output("s2")).await;
    let blocked = tokio::time::timeout(Duration::from_millis(50), bus.publish(output("s3"))).await;
    assert!(blocked.is_err(), "third publish should wait for room");

    let publisher = {
        let bus = bus.clone();
        tokio::spawn(async move {
            for id in ["s3", "s4", "s5"] {
                bus.publish(output(id)).await;
            }
        })
    };
    let mut seen = Vec::new();
    for _ in 0..5 {
        seen.push(rx.recv().await.unwrap().session_id().to_owned());
    }
    publisher.await.unwrap();

    assert_eq!(seen, vec!["s1", "s2", "s3", "s4", "s5"]);
}

#[test]
fn dropping_receiver_unsubscribes() {
    let bus = SignalBus::new();
    let rx = bus.subscribe().unwrap();
    assert_eq!(bus.subscriber_count(), 1);

    drop(rx);

    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn closed_bus_refuses_subscribers_and_signals() {
    let bus = SignalBus::new();
    let _rx = bus.subscribe().unwrap();

    bus.close();

    assert_eq!(bus.publish(output("s1")).await, 0);
    assert!(matches!(bus.subscribe(), Err(AppError::Subscription(_))));
}

//! Broker state-machine integration tests.

use std::sync::Arc;

use bytes::Bytes;
use kaska_broker::Broker;
use kaska_commits::SimulatedCommitStore;
use kaska_core::{Offset, TopicOffset};
use kaska_log::{SimulatedStorage, TopicLogStore};

async fn broker() -> Broker<SimulatedStorage, SimulatedCommitStore> {
    let logs = TopicLogStore::open(SimulatedStorage::new(), "/data")
        .await
        .unwrap();
    Broker::recover(logs, SimulatedCommitStore::new()).await
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test]
async fn test_broker_send_get_sequence() {
    let broker = broker().await;
    broker.create_topics(&names(&["t"])).await;

    let payloads = [&b"first"[..], b"second", b"third"];
    for payload in payloads {
        assert!(broker.send("t", Bytes::copy_from_slice(payload)).await);
    }

    // Every offset returns exactly the payload sent at that position.
    for (i, payload) in payloads.iter().enumerate() {
        let read = broker.get("t", Offset::new(i as u64)).await.unwrap();
        assert_eq!(&read[..], *payload);
    }

    // One past the end is absent.
    assert_eq!(broker.get("t", Offset::new(3)).await, None);
}

#[tokio::test]
async fn test_broker_concurrent_sends_lose_nothing() {
    let broker = Arc::new(broker().await);
    broker.create_topics(&names(&["t"])).await;

    let b1 = Arc::clone(&broker);
    let b2 = Arc::clone(&broker);
    let t1 = tokio::spawn(async move { b1.send("t", Bytes::from("from-one")).await });
    let t2 = tokio::spawn(async move { b2.send("t", Bytes::from("from-two")).await });

    assert!(t1.await.unwrap());
    assert!(t2.await.unwrap());

    // Both messages landed, in some definite order, with no duplication.
    let ends = broker.end_offsets(&names(&["t"])).await;
    assert_eq!(ends[0].offset, Offset::new(2));

    let first = broker.get("t", Offset::new(0)).await.unwrap();
    let second = broker.get("t", Offset::new(1)).await.unwrap();
    let mut seen = vec![first, second];
    seen.sort();
    assert_eq!(seen, vec![Bytes::from("from-one"), Bytes::from("from-two")]);
}

#[tokio::test]
async fn test_broker_end_offsets_snapshot() {
    let broker = broker().await;
    broker.create_topics(&names(&["a", "b"])).await;
    broker.send("a", Bytes::from("m")).await;

    let mut ends = broker.end_offsets(&names(&["a", "b", "ghost"])).await;
    ends.sort_by(|x, y| x.topic.cmp(&y.topic));
    assert_eq!(
        ends,
        vec![
            TopicOffset::new("a", Offset::new(1)),
            TopicOffset::new("b", Offset::new(0)),
        ]
    );
}

#[tokio::test]
async fn test_broker_commit_then_committed_across_instances() {
    // Two broker instances sharing the same stores model a restart.
    let storage = SimulatedStorage::new();
    let commits = SimulatedCommitStore::new();

    {
        let logs = TopicLogStore::open(storage.clone(), "/data").await.unwrap();
        let broker = Broker::recover(logs, commits.clone()).await;
        broker.create_topics(&names(&["t"])).await;
        broker.send("t", Bytes::from("m")).await;
        let cursors = vec![TopicOffset::new("t", Offset::new(5))];
        assert_eq!(broker.commit("consumer", &cursors).await, 1);
    }

    let logs = TopicLogStore::open(storage, "/data").await.unwrap();
    let restarted = Broker::recover(logs, commits).await;
    let saved = restarted.committed("consumer", &names(&["t"])).await;
    assert_eq!(saved, vec![TopicOffset::new("t", Offset::new(5))]);
}

#[tokio::test]
async fn test_broker_send_failure_keeps_memory_and_disk_aligned() {
    let storage = SimulatedStorage::new();
    let logs = TopicLogStore::open(storage.clone(), "/data").await.unwrap();
    let broker = Broker::recover(logs, SimulatedCommitStore::new()).await;
    broker.create_topics(&names(&["t"])).await;

    assert!(broker.send("t", Bytes::from("kept-1")).await);
    storage.fault_config().force_write_fail = true;
    assert!(!broker.send("t", Bytes::from("lost")).await);
    assert!(broker.send("t", Bytes::from("kept-2")).await);

    // The in-memory sequence holds exactly the acknowledged messages.
    let ends = broker.end_offsets(&names(&["t"])).await;
    assert_eq!(ends[0].offset, Offset::new(2));
    assert_eq!(
        broker.get("t", Offset::new(1)).await,
        Some(Bytes::from("kept-2"))
    );
}

#[tokio::test]
async fn test_broker_poll_multiple_topics() {
    let broker = broker().await;
    broker.create_topics(&names(&["a", "b"])).await;
    for payload in ["a0", "a1", "a2"] {
        broker.send("a", Bytes::from(payload)).await;
    }
    broker.send("b", Bytes::from("b0")).await;

    let cursors = vec![
        TopicOffset::new("a", Offset::new(1)),
        TopicOffset::new("b", Offset::new(0)),
        TopicOffset::new("ghost", Offset::new(0)),
    ];
    let unread = broker.poll(&cursors).await;

    assert_eq!(unread.len(), 2);
    assert_eq!(unread["a"], vec![Bytes::from("a1"), Bytes::from("a2")]);
    assert_eq!(unread["b"], vec![Bytes::from("b0")]);
}

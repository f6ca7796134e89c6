use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::topic::{NackOutcome, TopicQueue, TopicStats};
use super::{MessageId, QueueManager};
use crate::utils::QueueError;

fn ready_payloads(manager: &QueueManager, topic: &str) -> Vec<String> {
    let handle = manager.topic(topic);
    let queue = handle.lock().unwrap();
    queue
        .ready
        .iter()
        .map(|id| queue.messages[id].payload.clone())
        .collect()
}

/// Every tracked id lives in exactly one collection.
fn assert_partitioned(queue: &TopicQueue) {
    let mut seen = 0;
    for id in queue.messages.keys() {
        let places = usize::from(queue.ready.contains(id))
            + usize::from(queue.in_flight.contains(id))
            + usize::from(queue.dead_letter.contains(id));
        assert_eq!(places, 1, "message {id} is in {places} collections");
        seen += 1;
    }
    assert_eq!(seen, queue.stats().total());
}

#[test]
fn test_topic_new() {
    let topic = TopicQueue::new("test_topic");
    assert_eq!(topic.name, "test_topic");
    assert_eq!(topic.stats(), TopicStats::default());
}

#[test]
fn test_message_ids_are_unique() {
    let mut topic = TopicQueue::new("ids");
    let a = topic.enqueue("a", None).id.clone();
    let b = topic.enqueue("b", None).id.clone();
    assert_ne!(a, b);
    assert!(!a.as_str().is_empty());
}

#[test]
fn test_enqueue_sets_initial_state() {
    let mut topic = TopicQueue::new("t");
    let ttl = Duration::from_secs(30);
    let msg = topic.enqueue("hello", Some(ttl)).clone();
    assert_eq!(msg.payload, "hello");
    assert_eq!(msg.retry_count, 0);
    assert_eq!(msg.ttl, Some(ttl));
    assert_eq!(topic.stats().ready, 1);
}

#[test]
fn test_fifo_order_without_failures() {
    let manager = QueueManager::in_memory();
    let ids: Vec<MessageId> = (0..10)
        .map(|i| manager.enqueue("fifo", format!("m{i}"), None))
        .collect();

    let delivered: Vec<MessageId> = (0..10)
        .map(|_| manager.dequeue("fifo").unwrap().id)
        .collect();
    assert_eq!(ids, delivered);
}

#[test]
fn test_dequeue_empty_is_error_without_mutation() {
    let manager = QueueManager::in_memory();
    let id = manager.enqueue("t", "only", None);
    manager.dequeue("t").unwrap();
    let before = manager.stats("t");

    let err = manager.dequeue("t").unwrap_err();
    assert!(matches!(err, QueueError::Empty { ref topic } if topic == "t"));
    assert_eq!(manager.stats("t"), before);

    // the in-flight message is still settleable
    manager.ack("t", &id).unwrap();
}

#[test]
fn test_dequeue_on_never_used_topic() {
    let manager = QueueManager::in_memory();
    assert!(manager.dequeue("nothing").unwrap_err().is_empty());
    assert_eq!(manager.topics(), vec!["nothing".to_string()]);
}

#[test]
fn test_ack_discards_message() {
    let manager = QueueManager::in_memory();
    let id = manager.enqueue("t", "hello", None);
    let msg = manager.dequeue("t").unwrap();
    assert_eq!(msg.id, id);

    manager.ack("t", &id).unwrap();
    assert_eq!(manager.stats("t"), TopicStats::default());
    assert!(manager.topic("t").lock().unwrap().messages.is_empty());

    assert!(manager.ack("t", &id).unwrap_err().is_not_found());
    assert!(manager.nack("t", &id).unwrap_err().is_not_found());
    assert!(manager.dequeue("t").unwrap_err().is_empty());
}

#[test]
fn test_ack_and_nack_require_in_flight() {
    let manager = QueueManager::in_memory();
    let id = manager.enqueue("t", "ready, not delivered", None);

    assert!(manager.ack("t", &id).unwrap_err().is_not_found());
    assert!(manager.nack("t", &id).unwrap_err().is_not_found());
    assert!(
        manager
            .ack("t", &MessageId::from("unknown"))
            .unwrap_err()
            .is_not_found()
    );
    assert_eq!(manager.stats("t").ready, 1);
}

#[test]
fn test_nack_requeues_at_head() {
    let manager = QueueManager::in_memory();
    let first = manager.enqueue("t", "first", None);
    manager.enqueue("t", "second", None);

    let msg = manager.dequeue("t").unwrap();
    manager.enqueue("t", "third", None);
    let outcome = manager.nack("t", &msg.id).unwrap();
    assert_eq!(outcome, NackOutcome::Requeued { retry_count: 1 });
    assert_eq!(ready_payloads(&manager, "t"), ["first", "second", "third"]);

    let redelivered = manager.dequeue("t").unwrap();
    assert_eq!(redelivered.id, first);
    assert_eq!(redelivered.retry_count, 1);
}

#[test]
fn test_retry_then_dead_letter_scenario() {
    let manager = QueueManager::in_memory();
    let m1 = manager.enqueue("t", "m1", None);
    let m2 = manager.enqueue("t", "m2", None);
    manager.enqueue("t", "m3", None);

    for expected_retry in 1..=2 {
        let msg = manager.dequeue("t").unwrap();
        assert_eq!(msg.id, m1);
        assert_eq!(
            manager.nack("t", &m1).unwrap(),
            NackOutcome::Requeued {
                retry_count: expected_retry
            }
        );
        assert_eq!(ready_payloads(&manager, "t"), ["m1", "m2", "m3"]);
    }

    assert_eq!(manager.dequeue("t").unwrap().id, m1);
    assert_eq!(
        manager.nack("t", &m1).unwrap(),
        NackOutcome::DeadLettered { retry_count: 3 }
    );
    assert_eq!(ready_payloads(&manager, "t"), ["m2", "m3"]);

    let dlq = manager.dead_letters("t");
    assert_eq!(dlq.len(), 1);
    assert_eq!(dlq[0].id, m1);
    assert_eq!(dlq[0].retry_count, TopicQueue::MAX_RETRIES);

    assert_eq!(manager.dequeue("t").unwrap().id, m2);
    // dead-lettered messages are terminal
    assert!(manager.ack("t", &m1).unwrap_err().is_not_found());
    assert!(manager.nack("t", &m1).unwrap_err().is_not_found());
}

#[test]
fn test_dead_letters_keep_order() {
    let manager = QueueManager::in_memory();
    let a = manager.enqueue("t", "a", None);
    let b = manager.enqueue("t", "b", None);

    for id in [&a, &b] {
        for _ in 0..TopicQueue::MAX_RETRIES {
            let msg = manager.dequeue("t").unwrap();
            assert_eq!(&msg.id, id);
            manager.nack("t", id).unwrap();
        }
    }

    let dlq: Vec<MessageId> = manager.dead_letters("t").into_iter().map(|m| m.id).collect();
    assert_eq!(dlq, vec![a, b]);
    assert!(manager.dequeue("t").unwrap_err().is_empty());
}

#[test]
fn test_accounting_invariant() {
    let manager = QueueManager::in_memory();
    let mut enqueued = 0;
    let mut acked = 0;

    let check = |manager: &QueueManager, enqueued: usize, acked: usize| {
        assert_eq!(manager.stats("t").total(), enqueued - acked);
        assert_partitioned(&manager.topic("t").lock().unwrap());
    };

    for i in 0..6 {
        manager.enqueue("t", format!("m{i}"), None);
        enqueued += 1;
        check(&manager, enqueued, acked);
    }

    // ack evens, nack odds until they dead-letter
    while let Ok(msg) = manager.dequeue("t") {
        check(&manager, enqueued, acked);
        let n: usize = msg.payload[1..].parse().unwrap();
        if n % 2 == 0 {
            manager.ack("t", &msg.id).unwrap();
            acked += 1;
        } else {
            manager.nack("t", &msg.id).unwrap();
        }
        check(&manager, enqueued, acked);
    }

    assert_eq!(
        manager.stats("t"),
        TopicStats {
            ready: 0,
            in_flight: 0,
            dead_letter: 3
        }
    );
}

#[test]
fn test_topic_isolation() {
    let manager = QueueManager::in_memory();
    manager.enqueue("b", "untouched", None);
    let before = manager.stats("b");

    let id = manager.enqueue("a", "x", None);
    manager.dequeue("a").unwrap();
    manager.nack("a", &id).unwrap();
    manager.dequeue("a").unwrap();
    manager.ack("a", &id).unwrap();

    assert_eq!(manager.stats("b"), before);
    // ids are scoped to their topic
    let b_msg = manager.dequeue("b").unwrap();
    assert!(manager.ack("a", &b_msg.id).unwrap_err().is_not_found());
    manager.ack("b", &b_msg.id).unwrap();
}

#[test]
fn test_concurrent_producers_and_consumers() {
    let manager = Arc::new(QueueManager::in_memory());
    let topics = ["alpha", "beta", "gamma"];

    let producers: Vec<_> = topics
        .iter()
        .map(|topic| {
            let manager = Arc::clone(&manager);
            let topic = topic.to_string();
            thread::spawn(move || {
                for i in 0..200 {
                    manager.enqueue(&topic, format!("{topic}-{i}"), None);
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let mut acked = 0;
                for topic in ["alpha", "beta", "gamma"] {
                    while let Ok(msg) = manager.dequeue(topic) {
                        manager.ack(topic, &msg.id).unwrap();
                        acked += 1;
                    }
                }
                acked
            })
        })
        .collect();
    let total: usize = consumers.into_iter().map(|c| c.join().unwrap()).sum();

    assert_eq!(total, 600);
    for topic in topics {
        assert_eq!(manager.stats(topic), TopicStats::default());
    }
}

#[test]
fn test_restore_refuses_tracked_ids() {
    let mut topic = TopicQueue::new("t");
    let msg = topic.enqueue("original", None).clone();
    assert!(!topic.restore(msg.clone()));
    assert_eq!(topic.stats().ready, 1);

    let mut other = TopicQueue::new("t2");
    assert!(other.restore(msg));
    assert_eq!(other.stats().ready, 1);
}

#[test]
fn test_settle_errors_name_topic_and_id() {
    let mut topic = TopicQueue::new("orders");
    let id = topic.enqueue("o-1", None).id.clone();
    let msg = topic.dequeue().unwrap();
    assert_eq!(msg.id, id);
    assert_eq!(topic.stats().in_flight, 1);
    topic.ack(&id).unwrap();

    for err in [topic.nack(&id).unwrap_err(), topic.ack(&id).unwrap_err()] {
        match err {
            QueueError::NotFound { topic, id: missing } => {
                assert_eq!(topic, "orders");
                assert_eq!(missing, id);
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }
    assert_eq!(topic.stats(), TopicStats::default());
}

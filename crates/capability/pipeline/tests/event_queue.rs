use domain::{DataRecord, DataType};
use gw_pipeline::{EventQueue, EventQueueConfig, QueueStats};
use std::time::Duration;

fn record(device_id: &str, value: f64) -> DataRecord {
    DataRecord {
        time: 1_700_000_000_000,
        name: "DATA_POINT_1".to_string(),
        address: 1,
        datatype: DataType::Int16,
        value,
        device_id: device_id.to_string(),
        register_id: "R00000001".to_string(),
    }
}

fn small_queue(capacity: usize) -> EventQueue {
    EventQueue::new(EventQueueConfig {
        capacity,
        stream_capacity: 2,
        lock_timeout: Duration::from_millis(100),
    })
}

#[tokio::test]
async fn overflow_keeps_last_capacity_records_in_order() {
    let queue = EventQueue::default();
    for i in 0..=100 {
        assert!(queue.enqueue(record("D1", i as f64)).await);
    }
    assert_eq!(queue.size(), 100);
    assert!(queue.is_full());

    let mut values = Vec::new();
    while let Some(r) = queue.dequeue().await {
        values.push(r.value);
    }
    let expected: Vec<f64> = (1..=100).map(|i| i as f64).collect();
    assert_eq!(values, expected);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn dequeue_on_empty_returns_none() {
    let queue = small_queue(3);
    assert_eq!(queue.dequeue().await, None);
    assert_eq!(queue.peek().await, None);
    assert_eq!(queue.dequeue_stream().await, None);
}

#[tokio::test]
async fn peek_does_not_remove() {
    let queue = small_queue(3);
    queue.enqueue(record("D1", 1.0)).await;
    queue.enqueue(record("D1", 2.0)).await;
    assert_eq!(queue.peek().await.map(|r| r.value), Some(1.0));
    assert_eq!(queue.size(), 2);
}

#[tokio::test]
async fn stats_report_capacity_and_evictions() {
    let queue = small_queue(2);
    for i in 0..3 {
        queue.enqueue(record("D1", i as f64)).await;
    }
    assert_eq!(
        queue.stats(),
        QueueStats {
            size: 2,
            max_size: 2,
            is_empty: false,
            is_full: true,
            evicted: 1,
        }
    );
    assert!(queue.clear().await);
    assert!(queue.stats().is_empty);
}

#[tokio::test]
async fn stream_queue_is_independent() {
    let queue = small_queue(5);
    queue.enqueue(record("D1", 1.0)).await;
    for i in 0..3 {
        assert!(queue.enqueue_stream(record("D1", i as f64)).await);
    }
    assert_eq!(queue.size(), 1);
    assert_eq!(queue.stream_size(), 2);
    assert_eq!(queue.stream_stats().max_size, 2);
    assert_eq!(queue.peek_stream().await.map(|r| r.value), Some(1.0));

    assert!(queue.clear_stream().await);
    assert!(queue.is_stream_empty());
    assert_eq!(queue.size(), 1);
}

#[tokio::test]
async fn stats_serialize_as_json() {
    let queue = small_queue(4);
    let value = serde_json::to_value(queue.stats()).expect("serialize");
    assert_eq!(value["max_size"], 4);
    assert_eq!(value["is_empty"], true);
}

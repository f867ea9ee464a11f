use domain::{DataRecord, DataType};
use gw_pipeline::{DataPipeline, EventQueue, LiveTap, PublishOutcome};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn record(device_id: &str, value: f64) -> DataRecord {
    DataRecord {
        time: 1_700_000_000_000,
        name: "temperature".to_string(),
        address: 16,
        datatype: DataType::Float32,
        value,
        device_id: device_id.to_string(),
        register_id: "R00000001".to_string(),
    }
}

fn pipeline() -> DataPipeline {
    let queue = Arc::new(EventQueue::default());
    let tap = Arc::new(LiveTap::new(queue.clone()));
    DataPipeline::new(queue, tap)
}

#[tokio::test]
async fn tapped_device_is_streamed_only() {
    let pipeline = pipeline();
    pipeline.tap().select("DA").await;

    let a = pipeline.publish(record("DA", 1.0)).await;
    let b = pipeline.publish(record("DB", 2.0)).await;
    assert_eq!(a, PublishOutcome { queued: true, streamed: true });
    assert_eq!(b, PublishOutcome { queued: true, streamed: false });

    let queue = pipeline.queue();
    assert_eq!(queue.size(), 2);
    assert_eq!(queue.stream_size(), 1);
    assert_eq!(queue.dequeue_stream().await.map(|r| r.device_id), Some("DA".to_string()));

    pipeline.tap().clear().await;
    pipeline.publish(record("DA", 3.0)).await;
    assert!(queue.is_stream_empty());
    assert_eq!(queue.size(), 3);
}

#[tokio::test]
async fn changing_selection_clears_stream() {
    let pipeline = pipeline();
    pipeline.tap().select("DA").await;
    pipeline.publish(record("DA", 1.0)).await;
    assert_eq!(pipeline.queue().stream_size(), 1);

    // 重复选择同一设备不清空
    pipeline.tap().select("DA").await;
    assert_eq!(pipeline.queue().stream_size(), 1);

    pipeline.tap().select("DB").await;
    assert!(pipeline.queue().is_stream_empty());
    assert_eq!(pipeline.tap().selected().await.as_deref(), Some("DB"));
}

#[tokio::test]
async fn clear_if_only_matches_selected_device() {
    let pipeline = pipeline();
    pipeline.tap().select("DA").await;
    pipeline.publish(record("DA", 1.0)).await;

    assert!(!pipeline.tap().clear_if("DB").await);
    assert_eq!(pipeline.queue().stream_size(), 1);

    assert!(pipeline.tap().clear_if("DA").await);
    assert!(pipeline.queue().is_stream_empty());
    assert_eq!(pipeline.tap().selected().await, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reselection_never_leaves_records_of_previous_device() {
    let pipeline = pipeline();
    let stop = Arc::new(AtomicBool::new(false));

    let publishers: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = pipeline.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                while !stop.load(Ordering::Relaxed) {
                    pipeline.publish(record("DA", 1.0)).await;
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let mut foreign = 0;
    for _ in 0..300 {
        pipeline.tap().select("DA").await;
        tokio::task::yield_now().await;
        pipeline.tap().select("DB").await;
        while let Some(streamed) = pipeline.queue().dequeue_stream().await {
            if streamed.device_id != "DB" {
                foreign += 1;
            }
        }
        pipeline.queue().clear().await;
    }

    stop.store(true, Ordering::Relaxed);
    for publisher in publishers {
        publisher.await.expect("publisher");
    }
    assert_eq!(foreign, 0);
}

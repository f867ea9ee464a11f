//! 设备轮询计时表

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// 默认可跟踪的设备数
pub const DEFAULT_TIMER_CAPACITY: usize = 10;

/// 按设备记录上次轮询时间。
///
/// 容量有上限；表满后首次出现的设备不再计时，每个 tick 都会被轮询（仅告警一次）。
#[derive(Debug)]
pub struct DeviceTimers {
    capacity: usize,
    last_poll: HashMap<String, Instant>,
    overflow_logged: HashSet<String>,
}

impl DeviceTimers {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            last_poll: HashMap::new(),
            overflow_logged: HashSet::new(),
        }
    }

    /// 判断设备在 `now` 是否到期；首次出现的设备立即到期。
    pub fn is_due(&mut self, device_id: &str, refresh: Duration, now: Instant) -> bool {
        if let Some(last) = self.last_poll.get(device_id) {
            return now.saturating_duration_since(*last) >= refresh;
        }
        if self.last_poll.len() >= self.capacity && self.overflow_logged.insert(device_id.to_string()) {
            tracing::warn!(
                target: "gw.poller",
                device_id,
                capacity = self.capacity,
                "device_timer_table_full_polling_every_tick"
            );
        }
        true
    }

    /// 记录轮询时间；表满时不记录。
    pub fn mark_polled(&mut self, device_id: &str, at: Instant) {
        if let Some(last) = self.last_poll.get_mut(device_id) {
            *last = at;
        } else if self.last_poll.len() < self.capacity {
            self.overflow_logged.remove(device_id);
            self.last_poll.insert(device_id.to_string(), at);
        }
    }

    /// 丢弃已不在设备列表中的条目
    pub fn retain_listed(&mut self, listed: &HashSet<String>) {
        self.last_poll.retain(|id, _| listed.contains(id));
        self.overflow_logged.retain(|id| listed.contains(id));
    }

    pub fn tracked(&self) -> usize {
        self.last_poll.len()
    }

    pub fn is_tracked(&self, device_id: &str) -> bool {
        self.last_poll.contains_key(device_id)
    }
}

impl Default for DeviceTimers {
    fn default() -> Self {
        Self::new(DEFAULT_TIMER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_sighting_is_due_then_rate_limited() {
        let mut timers = DeviceTimers::default();
        let refresh = Duration::from_millis(1000);
        let start = Instant::now();

        assert!(timers.is_due("A", refresh, start));
        timers.mark_polled("A", start);
        assert!(!timers.is_due("A", refresh, start + Duration::from_millis(999)));
        assert!(timers.is_due("A", refresh, start + Duration::from_millis(1000)));
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_devices_are_always_due() {
        let mut timers = DeviceTimers::new(1);
        let refresh = Duration::from_secs(60);
        let now = Instant::now();

        timers.mark_polled("A", now);
        assert!(timers.is_due("B", refresh, now));
        timers.mark_polled("B", now);
        assert!(!timers.is_tracked("B"));
        assert!(timers.is_due("B", refresh, now));
        assert!(!timers.is_due("A", refresh, now));
    }

    #[tokio::test(start_paused = true)]
    async fn pruning_frees_slots() {
        let mut timers = DeviceTimers::new(1);
        let now = Instant::now();
        timers.mark_polled("A", now);

        timers.retain_listed(&HashSet::from(["B".to_string()]));
        assert_eq!(timers.tracked(), 0);

        timers.mark_polled("B", now);
        assert!(timers.is_tracked("B"));
    }
}

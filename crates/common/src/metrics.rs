use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::debug;

use crate::types::ChannelType;

/// Fire-and-forget sink for delivery outcomes. Must never fail the caller.
pub trait MetricsSink: Send + Sync {
    fn track_notification(&self, channel: ChannelType, success: bool);
}

impl<T: MetricsSink + ?Sized> MetricsSink for &T {
    fn track_notification(&self, channel: ChannelType, success: bool) {
        (**self).track_notification(channel, success)
    }
}

#[derive(Default)]
pub struct Metrics {
    notifications: Mutex<BTreeMap<(ChannelType, bool), u64>>,
    http_requests: Mutex<BTreeMap<(String, String, u16), u64>>,
}

pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::default);

impl Metrics {
    pub fn record_http_request(&self, method: &str, path: &str, status: u16) {
        *self
            .http_requests
            .lock()
            .entry((method.to_string(), path.to_string(), status))
            .or_insert(0) += 1;
    }

    pub fn notification_count(&self, channel: ChannelType, success: bool) -> u64 {
        self.notifications
            .lock()
            .get(&(channel, success))
            .copied()
            .unwrap_or(0)
    }

    /// Text exposition of every counter.
    pub fn gather(&self) -> String {
        let mut out = String::new();
        out.push_str("# TYPE notifications_sent_total counter\n");
        for ((channel, success), count) in self.notifications.lock().iter() {
            let status = if *success { "success" } else { "fail" };
            let _ = writeln!(
                out,
                "notifications_sent_total{{channel=\"{}\",status=\"{}\"}} {}",
                channel, status, count
            );
        }
        out.push_str("# TYPE http_requests_total counter\n");
        for ((method, path, status), count) in self.http_requests.lock().iter() {
            let _ = writeln!(
                out,
                "http_requests_total{{method=\"{}\",path=\"{}\",status=\"{}\"}} {}",
                method, path, status, count
            );
        }
        out
    }
}

impl MetricsSink for Metrics {
    fn track_notification(&self, channel: ChannelType, success: bool) {
        *self
            .notifications
            .lock()
            .entry((channel, success))
            .or_insert(0) += 1;
        debug!(%channel, success, "notification tracked");
    }
}

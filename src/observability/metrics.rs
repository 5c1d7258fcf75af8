//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define call metrics (requests, errors, latency, in-flight calls)
//! - Render a Prometheus-compatible text snapshot on demand
//! - Answer typed queries against a snapshot (used by tests and the CLI)
//!
//! # Metrics
//! - `rpc_requests_total` (counter): calls by method, status
//! - `rpc_errors_total` (counter): failed calls by method, error type
//! - `rpc_request_duration_seconds` (summary): latency quantiles by method
//! - `rpc_active_connections` (gauge): calls currently in flight
//! - `rpc_service_info` (gauge, always 1): service name and version
//!
//! # Design Decisions
//! - Each collector owns its own recorder; nothing is installed globally, so
//!   tests get isolated instances
//! - Updates are atomic operations on the recorder's handles
//! - Recording never fails and never blocks on a scrape
//! - Histogram samples buffer in the recorder until drained, so a collector
//!   that may go unscraped needs `spawn_upkeep`

use std::borrow::Cow;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

pub const REQUESTS_TOTAL: &str = "rpc_requests_total";
pub const ERRORS_TOTAL: &str = "rpc_errors_total";
pub const REQUEST_DURATION_SECONDS: &str = "rpc_request_duration_seconds";
pub const ACTIVE_CONNECTIONS: &str = "rpc_active_connections";
pub const SERVICE_INFO: &str = "rpc_service_info";

const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Final status of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Ok,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Ok => "ok",
            CallStatus::Error => "error",
        }
    }
}

/// Thread-safe aggregate of call metrics.
pub struct MetricsCollector {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector").finish_non_exhaustive()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Create a collector with its own Prometheus recorder.
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe_counter!(REQUESTS_TOTAL, "Total number of RPC calls");
            describe_counter!(ERRORS_TOTAL, "Total number of failed RPC calls");
            describe_histogram!(REQUEST_DURATION_SECONDS, "Duration of RPC calls in seconds");
            describe_gauge!(ACTIVE_CONNECTIONS, "Number of RPC calls currently in flight");
            describe_gauge!(SERVICE_INFO, "Service name and version");
            // Register the gauge up front so a scrape before the first call shows 0.
            gauge!(ACTIVE_CONNECTIONS).set(0.0);
            gauge!(SERVICE_INFO, "service" => SERVICE_NAME, "version" => SERVICE_VERSION).set(1.0);
        });

        Self { recorder, handle }
    }

    /// A call has started.
    pub fn call_started(&self) {
        metrics::with_local_recorder(&self.recorder, || {
            gauge!(ACTIVE_CONNECTIONS).increment(1.0);
        });
    }

    /// A call has ended, whatever its outcome.
    pub fn call_finished(&self) {
        metrics::with_local_recorder(&self.recorder, || {
            gauge!(ACTIVE_CONNECTIONS).decrement(1.0);
        });
    }

    /// Record a completed call and its duration.
    pub fn record_request(&self, method: &str, status: CallStatus, duration: Duration) {
        metrics::with_local_recorder(&self.recorder, || {
            counter!(REQUESTS_TOTAL, "method" => method.to_owned(), "status" => status.as_str())
                .increment(1);
            histogram!(REQUEST_DURATION_SECONDS, "method" => method.to_owned())
                .record(duration.as_secs_f64());
        });
    }

    /// Record a failed call's classification.
    pub fn record_error(&self, method: &str, error_type: Cow<'static, str>) {
        metrics::with_local_recorder(&self.recorder, || {
            counter!(ERRORS_TOTAL, "method" => method.to_owned(), "error_type" => error_type)
                .increment(1);
        });
    }

    /// Render the current state in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Point-in-time view of every metric.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::parse(self.render())
    }

    /// Drain buffered histogram samples into their summaries every
    /// `interval` until `shutdown` fires.
    pub fn spawn_upkeep(
        &self,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let handle = self.handle.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => handle.run_upkeep(),
                    _ = shutdown.recv() => break,
                }
            }
            tracing::debug!("Metrics upkeep stopped");
        })
    }
}

/// One sample line from the exposition text.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl Sample {
    fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn has_labels(&self, expected: &[(&str, &str)]) -> bool {
        self.labels.len() == expected.len()
            && expected.iter().all(|(k, v)| self.label(k) == Some(*v))
    }
}

/// A rendered metrics snapshot plus typed accessors over it.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    text: String,
    samples: Vec<Sample>,
}

impl MetricsSnapshot {
    /// Parse Prometheus exposition text. Lines that do not parse are skipped.
    pub fn parse(text: String) -> Self {
        let samples = text.lines().filter_map(parse_sample).collect();
        Self { text, samples }
    }

    /// The exposition text, as served to scrapers.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    fn value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.name == name && s.has_labels(labels))
            .map(|s| s.value)
    }

    /// `request_count[method, status]`.
    pub fn request_count(&self, method: &str, status: CallStatus) -> u64 {
        self.value(REQUESTS_TOTAL, &[("method", method), ("status", status.as_str())])
            .map_or(0, |v| v as u64)
    }

    /// `error_count[method, error_type]`.
    pub fn error_count(&self, method: &str, error_type: &str) -> u64 {
        self.value(ERRORS_TOTAL, &[("method", method), ("error_type", error_type)])
            .map_or(0, |v| v as u64)
    }

    /// Calls currently in flight.
    pub fn active_connections(&self) -> i64 {
        self.value(ACTIVE_CONNECTIONS, &[]).map_or(0, |v| v as i64)
    }

    /// `(service, version)` from the info metric.
    pub fn service_info(&self) -> Option<(&str, &str)> {
        let sample = self.samples.iter().find(|s| s.name == SERVICE_INFO)?;
        Some((sample.label("service")?, sample.label("version")?))
    }

    /// Number of durations observed for `method`.
    pub fn duration_count(&self, method: &str) -> u64 {
        let name = format!("{REQUEST_DURATION_SECONDS}_count");
        self.value(&name, &[("method", method)]).map_or(0, |v| v as u64)
    }

    /// Sum of durations observed for `method`, in seconds.
    pub fn duration_sum(&self, method: &str) -> f64 {
        let name = format!("{REQUEST_DURATION_SECONDS}_sum");
        self.value(&name, &[("method", method)]).unwrap_or(0.0)
    }

    /// Estimated duration quantile for `method`, in seconds.
    pub fn duration_quantile(&self, method: &str, quantile: f64) -> Option<f64> {
        self.samples
            .iter()
            .filter(|s| s.name == REQUEST_DURATION_SECONDS && s.label("method") == Some(method))
            .find(|s| {
                s.label("quantile")
                    .and_then(|q| q.parse::<f64>().ok())
                    .is_some_and(|q| (q - quantile).abs() < f64::EPSILON)
            })
            .map(|s| s.value)
    }
}

fn parse_sample(line: &str) -> Option<Sample> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (series, value) = line.rsplit_once(' ')?;
    let value = value.parse::<f64>().ok()?;

    let (name, labels) = match series.split_once('{') {
        Some((name, rest)) => (name, parse_labels(rest.strip_suffix('}')?)?),
        None => (series, Vec::new()),
    };

    Some(Sample {
        name: name.to_string(),
        labels,
        value,
    })
}

fn parse_labels(body: &str) -> Option<Vec<(String, String)>> {
    let mut labels = Vec::new();
    let mut chars = body.chars().peekable();

    while chars.peek().is_some() {
        let key: String = chars.by_ref().take_while(|c| *c != '=').collect();
        if chars.next()? != '"' {
            return None;
        }

        let mut value = String::new();
        loop {
            match chars.next()? {
                '\\' => match chars.next()? {
                    'n' => value.push('\n'),
                    other => value.push(other),
                },
                '"' => break,
                c => value.push(c),
            }
        }
        labels.push((key, value));

        if chars.peek() == Some(&',') {
            chars.next();
        }
    }

    Some(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_collector_is_zeroed() {
        let collector = MetricsCollector::new();
        let snapshot = collector.snapshot();
        assert_eq!(snapshot.active_connections(), 0);
        assert_eq!(snapshot.request_count("m", CallStatus::Ok), 0);
        assert!(snapshot.as_str().contains(ACTIVE_CONNECTIONS));
    }

    #[test]
    fn test_records_by_label() {
        let collector = MetricsCollector::new();
        collector.record_request("/svc/A", CallStatus::Ok, Duration::from_millis(10));
        collector.record_request("/svc/A", CallStatus::Ok, Duration::from_millis(30));
        collector.record_request("/svc/A", CallStatus::Error, Duration::from_millis(5));
        collector.record_error("/svc/A", Cow::Borrowed("TimedOut"));
        collector.record_request("/svc/B", CallStatus::Ok, Duration::from_millis(1));

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.request_count("/svc/A", CallStatus::Ok), 2);
        assert_eq!(snapshot.request_count("/svc/A", CallStatus::Error), 1);
        assert_eq!(snapshot.request_count("/svc/B", CallStatus::Ok), 1);
        assert_eq!(snapshot.error_count("/svc/A", "TimedOut"), 1);
        assert_eq!(snapshot.error_count("/svc/B", "TimedOut"), 0);
        assert_eq!(snapshot.duration_count("/svc/A"), 3);
        assert!((snapshot.duration_sum("/svc/A") - 0.045).abs() < 1e-9);

        let max = snapshot.duration_quantile("/svc/A", 1.0).unwrap();
        assert!(max > 0.025 && max < 0.035, "max quantile was {max}");
    }

    #[test]
    fn test_service_info_is_exported() {
        let snapshot = MetricsCollector::new().snapshot();
        assert_eq!(snapshot.service_info(), Some(("rpc-balancer", env!("CARGO_PKG_VERSION"))));
        assert!(snapshot
            .as_str()
            .contains(&format!("{SERVICE_INFO}{{service=\"rpc-balancer\",version=\"{}\"}} 1", env!("CARGO_PKG_VERSION"))));
    }

    #[tokio::test]
    async fn test_upkeep_drains_and_stops() {
        let collector = MetricsCollector::new();
        let (tx, rx) = broadcast::channel(1);
        let upkeep = collector.spawn_upkeep(Duration::from_millis(5), rx);

        for _ in 0..1000 {
            collector.record_request("/svc/A", CallStatus::Ok, Duration::from_millis(2));
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Draining folds samples into the summary without losing any.
        let snapshot = collector.snapshot();
        assert_eq!(snapshot.duration_count("/svc/A"), 1000);
        assert!((snapshot.duration_sum("/svc/A") - 2.0).abs() < 1e-6);

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), upkeep).await.unwrap().unwrap();
    }

    #[test]
    fn test_collectors_are_isolated() {
        let a = MetricsCollector::new();
        let b = MetricsCollector::new();
        a.record_request("m", CallStatus::Ok, Duration::ZERO);
        a.call_started();

        assert_eq!(a.snapshot().request_count("m", CallStatus::Ok), 1);
        assert_eq!(a.snapshot().active_connections(), 1);
        assert_eq!(b.snapshot().request_count("m", CallStatus::Ok), 0);
        assert_eq!(b.snapshot().active_connections(), 0);
    }

    #[test]
    fn test_gauge_round_trip() {
        let collector = MetricsCollector::new();
        collector.call_started();
        collector.call_started();
        assert_eq!(collector.snapshot().active_connections(), 2);
        collector.call_finished();
        collector.call_finished();
        assert_eq!(collector.snapshot().active_connections(), 0);
    }

    #[test]
    fn test_parse_escaped_label_values() {
        let snapshot = MetricsSnapshot::parse(
            "# TYPE x counter\nx{a=\"q\\\"uote\",b=\"c,d\"} 3\ny 1.5\n".to_string(),
        );
        assert_eq!(snapshot.samples().len(), 2);
        assert_eq!(
            snapshot.samples()[0].labels,
            vec![("a".to_string(), "q\"uote".to_string()), ("b".to_string(), "c,d".to_string())]
        );
        assert_eq!(snapshot.samples()[1].value, 1.5);
    }
}

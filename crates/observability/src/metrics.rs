//! Relay 指标收集模块
//!
//! 记录批处理、事件丢弃、目的地分发与连接检测指标，并提供内存聚合器用于输出摘要。

use std::collections::HashMap;

use contracts::EventType;
use metrics::{counter, gauge, histogram};

/// 记录接收到的批次
pub fn record_batch_received(size: usize) {
    counter!("consent_relay_batches_total").increment(1);
    counter!("consent_relay_events_received_total").increment(size as u64);
    histogram!("consent_relay_batch_size").record(size as f64);
}

/// 记录被拒绝的批次 (超过 max_batch_size)
pub fn record_batch_rejected(size: usize, max: usize) {
    counter!("consent_relay_batches_rejected_total").increment(1);
    gauge!("consent_relay_last_rejected_batch_size").set(size as f64);
    gauge!("consent_relay_max_batch_size").set(max as f64);
}

/// 记录某处理阶段丢弃的事件数
///
/// `stage`: "validation" / "filter" / "consent"
pub fn record_events_dropped(stage: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        "consent_relay_events_dropped_total",
        "stage" => stage.to_string()
    )
    .increment(count as u64);
}

/// 记录单个事件分发结果
pub fn record_event_dispatched(destination: &str, event_type: EventType, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "consent_relay_events_dispatched_total",
        "destination" => destination.to_string(),
        "event_type" => event_type.as_str(),
        "status" => status
    )
    .increment(1);
}

/// 记录目的地单批次分发耗时
pub fn record_dispatch_latency_ms(destination: &str, latency_ms: f64) {
    histogram!(
        "consent_relay_dispatch_latency_ms",
        "destination" => destination.to_string()
    )
    .record(latency_ms);
}

/// 记录目的地加载结果
pub fn record_destination_loaded(destination: &str, success: bool) {
    let status = if success { "loaded" } else { "failed" };
    counter!(
        "consent_relay_destination_loads_total",
        "destination" => destination.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录当前已加载目的地数量
pub fn record_loaded_destinations(count: usize) {
    gauge!("consent_relay_destinations_loaded").set(count as f64);
}

/// 记录连接检测结果
///
/// `status`: "connected" / "disconnected" / "error"
pub fn record_connection_test(destination: &str, status: &str) {
    counter!(
        "consent_relay_connection_tests_total",
        "destination" => destination.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 批处理指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct RelayMetricsAggregator {
    /// 总批次数
    pub total_batches: u64,

    /// 被拒绝批次数
    pub rejected_batches: u64,

    /// 接收事件总数
    pub events_received: u64,

    /// 通过处理阶段的事件总数
    pub events_accepted: u64,

    /// 批大小统计
    pub batch_size_stats: RunningStats,

    /// 各目的地分发耗时统计 (毫秒)
    pub latency_stats: HashMap<String, RunningStats>,
}

impl RelayMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个已处理的批次
    pub fn record_batch(&mut self, received: usize, accepted: usize) {
        self.total_batches += 1;
        self.events_received += received as u64;
        self.events_accepted += accepted as u64;
        self.batch_size_stats.push(received as f64);
    }

    /// 记录一个被拒绝的批次
    pub fn record_rejected(&mut self) {
        self.total_batches += 1;
        self.rejected_batches += 1;
    }

    /// 记录目的地分发耗时
    pub fn record_latency(&mut self, destination: &str, latency_ms: f64) {
        self.latency_stats
            .entry(destination.to_string())
            .or_default()
            .push(latency_ms);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_batches: self.total_batches,
            rejected_batches: self.rejected_batches,
            events_received: self.events_received,
            events_accepted: self.events_accepted,
            drop_rate: if self.events_received > 0 {
                (self.events_received - self.events_accepted) as f64
                    / self.events_received as f64
                    * 100.0
            } else {
                0.0
            },
            batch_size: StatsSummary::from(&self.batch_size_stats),
            latency_ms: self
                .latency_stats
                .iter()
                .map(|(k, v)| (k.clone(), StatsSummary::from(v)))
                .collect(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_batches: u64,
    pub rejected_batches: u64,
    pub events_received: u64,
    pub events_accepted: u64,
    pub drop_rate: f64,
    pub batch_size: StatsSummary,
    pub latency_ms: HashMap<String, StatsSummary>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Relay Metrics Summary ===")?;
        writeln!(
            f,
            "Batches: {} ({} rejected)",
            self.total_batches, self.rejected_batches
        )?;
        writeln!(f, "Events received: {}", self.events_received)?;
        writeln!(
            f,
            "Events accepted: {} (dropped {:.2}%)",
            self.events_accepted, self.drop_rate
        )?;
        writeln!(f, "Batch size: {}", self.batch_size)?;

        if !self.latency_ms.is_empty() {
            writeln!(f, "Dispatch latency (ms):")?;
            let mut destinations: Vec<_> = self.latency_ms.iter().collect();
            destinations.sort_by(|a, b| a.0.cmp(b.0));
            for (destination, stats) in destinations {
                writeln!(f, "  {}: {}", destination, stats)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

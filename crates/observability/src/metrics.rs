//! 分发基准指标收集模块
//!
//! 通过 `metrics` facade 记录各阶段指标，并提供内存中的在线统计。

use contracts::DispatchMode;
use metrics::{counter, gauge, histogram};
use serde::Serialize;

/// 记录一次批量写入
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_batch_flushed;
///
/// let start = Instant::now();
/// sink.persist(&batch)?;
/// record_batch_flushed(DispatchMode::Pull, batch.len(), start.elapsed().as_secs_f64() * 1000.0);
/// ```
pub fn record_batch_flushed(mode: DispatchMode, rows: usize, latency_ms: f64) {
    counter!("dispatch_bench_batches_flushed_total", "mode" => mode.as_str()).increment(1);
    counter!("dispatch_bench_events_processed_total", "mode" => mode.as_str())
        .increment(rows as u64);
    histogram!("dispatch_bench_flush_latency_ms", "mode" => mode.as_str()).record(latency_ms);
    histogram!("dispatch_bench_batch_rows", "mode" => mode.as_str()).record(rows as f64);
}

/// 记录一次持久化重试
pub fn record_flush_retry(mode: DispatchMode, attempt: u32) {
    counter!("dispatch_bench_flush_retries_total", "mode" => mode.as_str()).increment(1);
    gauge!("dispatch_bench_flush_last_attempt", "mode" => mode.as_str()).set(attempt as f64);
}

/// 记录重试耗尽
pub fn record_flush_failed(mode: DispatchMode) {
    counter!("dispatch_bench_flush_failures_total", "mode" => mode.as_str()).increment(1);
}

/// 记录拉取队列深度
pub fn record_queue_depth(depth: usize) {
    gauge!("dispatch_bench_queue_depth").set(depth as f64);
}

/// 记录阶段耗时与吞吐
pub fn record_phase(mode: DispatchMode, phase: &'static str, seconds: f64, events_per_sec: f64) {
    histogram!("dispatch_bench_phase_seconds", "mode" => mode.as_str(), "phase" => phase)
        .record(seconds);
    if events_per_sec.is_finite() {
        gauge!("dispatch_bench_throughput_eps", "mode" => mode.as_str(), "phase" => phase)
            .set(events_per_sec);
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default, Serialize)]
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
                "mean={:.2} min={:.2} max={:.2} std={:.2} (n={})",
                self.mean, self.min, self.max, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford)
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
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// 合并另一组统计 (多个消费者的刷盘延迟)
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        self.m2 += other.m2 + delta * delta * (self.count * other.count) as f64 / count as f64;
        self.mean = mean;
        self.count = count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}

//! SimulationBlueprint - Config Loader 输出
//!
//! 描述一次完整的对比运行：事件数量、分发策略、消费者批量、存储位置。
//! 运行开始前确定，运行期间不可变。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 单批次上限
pub const MAX_BATCH_SIZE: usize = 100_000;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的运行配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 依次运行的模式
    #[serde(default = "default_modes")]
    pub modes: Vec<DispatchMode>,

    /// 事件生成设置
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// 分发核心设置
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// 消费者设置
    #[serde(default)]
    pub consumer: ConsumerConfig,

    /// 存储设置
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_modes() -> Vec<DispatchMode> {
    vec![DispatchMode::Pull, DispatchMode::Push]
}

impl Default for SimulationBlueprint {
    fn default() -> Self {
        Self {
            version: ConfigVersion::V1,
            modes: default_modes(),
            simulation: SimulationConfig::default(),
            dispatch: DispatchConfig::default(),
            consumer: ConsumerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// 事件生成设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// 生成事件总数，必须 > 0
    #[serde(default = "default_events")]
    pub events: u64,

    /// 随机种子 (None = 每次不同)
    #[serde(default)]
    pub seed: Option<u64>,

    /// 模拟账户池大小
    #[serde(default = "default_account_pool")]
    pub account_pool: u32,
}

fn default_events() -> u64 {
    100_000
}

fn default_account_pool() -> u32 {
    10_000
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            events: default_events(),
            seed: None,
            account_pool: default_account_pool(),
        }
    }
}

/// 分发核心设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// 拉取队列容量 (0 = 无界)
    #[serde(default)]
    pub queue_capacity: usize,

    /// 队列满时的背压策略
    #[serde(default)]
    pub backpressure: BackpressurePolicy,

    /// 推送层微批大小 (1 = 逐条回调)
    #[serde(default = "default_push_batch_size")]
    pub push_batch_size: usize,
}

fn default_push_batch_size() -> usize {
    1
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 0,
            backpressure: BackpressurePolicy::default(),
            push_batch_size: default_push_batch_size(),
        }
    }
}

impl DispatchConfig {
    /// Queue bound, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        (self.queue_capacity > 0).then_some(self.queue_capacity)
    }
}

/// 背压策略 (有界队列满时)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// 阻塞生产者直到有空位
    #[default]
    Block,
    /// 立即返回 Capacity 错误
    FailFast,
    /// 丢弃新事件并计数
    DropNewest,
}

/// 分发模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// 消费者轮询共享队列
    Pull,
    /// 生产者直接回调已注册的消费者
    Push,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Pull => "pull",
            DispatchMode::Push => "push",
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 消费者设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// 批量写入阈值 (None = 按事件数自动推导)
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// 拉取轮询间隔 (毫秒)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// 拉取消费者线程数
    #[serde(default = "default_pull_consumers")]
    pub pull_consumers: usize,

    /// 持久化重试策略
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_poll_interval_ms() -> u64 {
    5
}

fn default_pull_consumers() -> usize {
    1
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            poll_interval_ms: default_poll_interval_ms(),
            pull_consumers: default_pull_consumers(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ConsumerConfig {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Batch size derived from the event count when none is configured
pub fn derive_batch_size(events: u64) -> usize {
    (events / 1000).clamp(500, 5000) as usize
}

/// 持久化重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 每批最多尝试次数 (含首次)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// 两次尝试之间的等待 (毫秒)
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    10
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// 存储设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 数据库输出目录
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// 拉取模式数据库文件名
    #[serde(default = "default_pull_db")]
    pub pull_db: String,

    /// 推送模式数据库文件名
    #[serde(default = "default_push_db")]
    pub push_db: String,

    /// SQLite busy timeout (毫秒)
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_pull_db() -> String {
    "banking_events_pull.db".to_string()
}

fn default_push_db() -> String {
    "banking_events_push.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            pull_db: default_pull_db(),
            push_db: default_push_db(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StorageConfig {
    /// Database path for a mode
    pub fn db_path(&self, mode: DispatchMode) -> PathBuf {
        match mode {
            DispatchMode::Pull => self.output_dir.join(&self.pull_db),
            DispatchMode::Push => self.output_dir.join(&self.push_db),
        }
    }
}

impl SimulationBlueprint {
    /// Flush threshold in effect for this run
    pub fn batch_size(&self) -> usize {
        self.consumer
            .batch_size
            .unwrap_or_else(|| derive_batch_size(self.simulation.events))
    }
}

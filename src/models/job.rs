//! 生成任务及其状态

use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;

use super::generation::ReferenceKey;

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// 默认最大轮询次数（20 × 30s = 10 分钟上限）
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// 任务状态
///
/// 不由服务端持久化，而是从轮询结果推断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Idle,
    Submitting,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobStatus {
    /// 终止状态之后不再轮询
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::TimedOut | JobStatus::Cancelled
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            JobStatus::Idle => "空闲",
            JobStatus::Submitting => "提交中",
            JobStatus::Polling => "轮询中",
            JobStatus::Succeeded => "成功",
            JobStatus::Failed => "失败",
            JobStatus::TimedOut => "超时",
            JobStatus::Cancelled => "已取消",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 一次异步生成任务
#[derive(Debug, Clone)]
pub struct Job {
    pub reference_key: ReferenceKey,
    pub status: JobStatus,
    pub attempt_count: u32,
    pub created_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
}

impl Job {
    pub fn new(reference_key: ReferenceKey) -> Self {
        Self {
            reference_key,
            status: JobStatus::Polling,
            attempt_count: 0,
            created_at: Local::now(),
            finished_at: None,
        }
    }
}

/// 轮询参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollSettings {
    /// 间隔和次数都至少为 1
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            max_attempts: max_attempts.max(1),
        }
    }

    /// 轮询的硬性时间上限
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

/// 由轮询次数推算的进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEstimate {
    pub attempt: u32,
    pub max_attempts: u32,
    pub elapsed: Duration,
    /// 距离超时还剩的最长时间
    pub remaining_ceiling: Duration,
}

impl ProgressEstimate {
    pub fn new(attempt: u32, settings: &PollSettings) -> Self {
        let attempt = attempt.min(settings.max_attempts);
        Self {
            attempt,
            max_attempts: settings.max_attempts,
            elapsed: settings.interval * attempt,
            remaining_ceiling: settings.interval * (settings.max_attempts - attempt),
        }
    }
}

impl fmt::Display for ProgressEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "第 {}/{} 次查询, 已等待 {}s, 最多还需 {}s",
            self.attempt,
            self.max_attempts,
            self.elapsed.as_secs(),
            self.remaining_ceiling.as_secs()
        )
    }
}

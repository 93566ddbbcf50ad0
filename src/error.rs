//! 错误类型
//!
//! 按层划分：传输层 `HttpError`，提交阶段 `SubmissionError`，
//! 轮询阶段 `PollError`，对外的 `TrackerError`，以及配置错误 `ConfigError`。

use thiserror::Error;

/// HTTP 传输错误
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// 服务端有响应，但状态码不是 2xx
    #[error("服务端返回状态码 {status}: {body}")]
    Status { status: u16, body: String },
    /// 没有收到任何响应（连接失败、超时等）
    #[error("网络请求失败: {0}")]
    Transport(String),
    /// 响应体无法解析为 JSON
    #[error("响应解析失败: {0}")]
    Decode(String),
}

/// 提交生成请求失败
#[derive(Debug, Clone, Error)]
pub enum SubmissionError {
    /// 请求本身不合法，未发出网络请求
    #[error("生成请求不合法: {reason}")]
    InvalidRequest { reason: String },
    /// 服务端有响应但表示失败
    #[error("服务端拒绝了生成请求 (状态码: {status:?}): {message}")]
    ServerRejected { status: Option<u16>, message: String },
    /// 没有收到响应
    #[error("提交生成请求时网络异常: {reason}")]
    Network { reason: String },
    /// 其他异常
    #[error("提交生成请求时发生意外错误: {reason}")]
    Unexpected { reason: String },
}

impl From<HttpError> for SubmissionError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Status { status, body } => SubmissionError::ServerRejected {
                status: Some(status),
                message: body,
            },
            HttpError::Transport(reason) => SubmissionError::Network { reason },
            HttpError::Decode(reason) => SubmissionError::Unexpected { reason },
        }
    }
}

/// 轮询阶段错误
#[derive(Debug, Clone, Error)]
pub enum PollError {
    /// 已有任务在轮询中
    #[error("任务 {reference_key} 正在轮询中")]
    AlreadyPolling { reference_key: String },
    #[error("状态查询被服务端拒绝 (状态码: {status:?}): {message}")]
    ServerRejected { status: Option<u16>, message: String },
    #[error("状态查询网络异常: {reason}")]
    Network { reason: String },
    #[error("状态查询发生意外错误: {reason}")]
    Unexpected { reason: String },
}

impl From<HttpError> for PollError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Status { status, body } => PollError::ServerRejected {
                status: Some(status),
                message: body,
            },
            HttpError::Transport(reason) => PollError::Network { reason },
            HttpError::Decode(reason) => PollError::Unexpected { reason },
        }
    }
}

/// 控制器对调用方暴露的错误
#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    /// 已有任务在进行，拒绝再次开始
    #[error("已有生成任务在进行中 ({reference_key})")]
    JobActive { reference_key: String },
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Poll(#[from] PollError),
}

/// 配置错误
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("配置项 {field} 不合法: {reason}")]
    Invalid { field: &'static str, reason: String },
}

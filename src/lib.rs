//! # Question Generation Tracker
//!
//! 提交 AI 出题任务并跟踪到完成的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有 HTTP 连接，只暴露能力
//! - `HttpClient` - JSON 请求能力，`ReqwestHttpClient` 为真实实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每次只做一件事
//! - `JobClient` - 提交生成请求 / 查询一次状态
//! - `materializer` - 原始题目 → 统一题目记录，合并题目列表
//! - `WarnWriter` - 写 warn.txt 能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个任务"的轮询流程
//! - `PollScheduler` - 固定间隔查询，超时 / 成功 / 失败 / 取消
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/tracker` - 生成任务控制器，持有题目列表
//! - `orchestrator/app` - 命令行应用，管理草稿、题库和统计
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{ConfigError, HttpError, PollError, SubmissionError, TrackerError};
pub use infrastructure::{HttpClient, ReqwestHttpClient};
pub use models::{
    CanonicalRecord, GenerationRequest, JobStatus, PollSettings, RawItem, ReferenceKey,
};
pub use orchestrator::{App, RunSummary, TrackerController, TrackerEvent, TrackerHandle};
pub use services::JobClient;
pub use workflow::{PollEvent, PollScheduler};

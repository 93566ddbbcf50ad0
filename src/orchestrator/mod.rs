//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责把一次出题任务从提交一直带到终止状态，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `tracker` - 生成任务控制器
//! - 保证同一时间只有一个任务
//! - 提交请求，成功后交给轮询调度器
//! - 把原始结果转换并合并进题目列表
//! - 把每一步转换成 `TrackerEvent` 通知调用方
//!
//! ### `app` - 命令行应用
//! - 管理应用生命周期（初始化、运行、统计）
//! - 恢复 / 保存试卷草稿，导入题库
//! - 监听 Ctrl-C 取消任务
//! - 失败记录写入 warn.txt
//!
//! ## 层次关系
//!
//! ```text
//! app (一次运行)
//!     ↓
//! tracker (一个生成任务 + 题目列表)
//!     ↓
//! workflow::PollScheduler (轮询一个 reference key)
//!     ↓
//! services (能力层：job_client / materializer / warn_writer)
//!     ↓
//! infrastructure (基础设施：HttpClient)
//! ```

pub mod app;
pub mod tracker;

// 重新导出主要类型
pub use app::{App, RunSummary};
pub use tracker::{TrackerCallback, TrackerController, TrackerEvent, TrackerHandle};

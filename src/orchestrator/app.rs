//! 命令行应用 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次完整的出题流程和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：日志文件、启动信息、HTTP 客户端、控制器
//! 2. **题目加载**：恢复试卷草稿，导入题库
//! 3. **生成跟踪**：提交一次生成请求，等待终止事件，Ctrl-C 取消
//! 4. **结果落地**：保存草稿，超时 / 失败写入 warn.txt
//! 5. **最终统计**：输出结果并追加到日志文件

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::{HttpClient, ReqwestHttpClient};
use crate::models::{
    load_all_question_banks, load_exam_draft, save_exam_draft, CanonicalRecord, ExamDraft,
    JobStatus, ReferenceKey,
};
use crate::orchestrator::tracker::{TrackerCallback, TrackerController, TrackerEvent};
use crate::services::{materialize, JobClient, WarnWriter};
use crate::utils::logging;

/// 一次运行的结果
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// 任务的最终状态；提交失败时为 Idle
    pub outcome: JobStatus,
    pub reference_key: Option<ReferenceKey>,
    pub attempts: u32,
    /// 草稿中的题目总数
    pub total_questions: usize,
    pub message: String,
}

/// 应用主结构
pub struct App<H = ReqwestHttpClient> {
    config: Config,
    tracker: TrackerController<H>,
    events: mpsc::UnboundedReceiver<TrackerEvent>,
    warn_writer: WarnWriter,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        let http = ReqwestHttpClient::new(
            &config.api_base_url,
            &config.api_token,
            config.http_timeout(),
        )
        .context("无法创建 HTTP 客户端")?;

        Self::with_http(config, http).await
    }
}

impl<H: HttpClient> App<H> {
    /// 使用指定的 HTTP 客户端初始化应用
    pub async fn with_http(config: Config, http: H) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)
            .with_context(|| format!("无法创建日志文件: {}", config.output_log_file))?;

        logging::log_startup(&config);

        let (tx, events) = mpsc::unbounded_channel();
        let on_event: TrackerCallback = Arc::new(move |event| {
            // 接收端只会在 App 被释放后关闭
            let _ = tx.send(event);
        });

        let client = JobClient::from_config(http, &config);
        let tracker = TrackerController::new(client, config.poll_settings(), on_event);
        let warn_writer = WarnWriter::with_path(&config.warn_file);

        Ok(Self {
            config,
            tracker,
            events,
            warn_writer,
        })
    }

    pub fn tracker(&self) -> &TrackerController<H> {
        &self.tracker
    }

    /// 运行应用主逻辑
    pub async fn run(&mut self) -> Result<RunSummary> {
        self.load_draft().await?;
        self.import_question_banks().await?;

        let request = self.config.generation_request();
        let summary = match self.tracker.start_generation(&request).await {
            Ok(key) => self.wait_for_outcome(key).await?,
            Err(e) => {
                error!("❌ 无法开始生成任务: {}", e);
                self.write_warning(None, &e.to_string()).await;
                RunSummary {
                    outcome: JobStatus::Idle,
                    reference_key: None,
                    attempts: 0,
                    total_questions: self.tracker.questions().len(),
                    message: format!("提交生成请求失败: {}", e),
                }
            }
        };

        self.save_draft().await?;

        logging::print_final_stats(
            &summary.message,
            summary.attempts,
            summary.total_questions,
            &self.config.output_log_file,
        );
        logging::append_log_line(
            &self.config.output_log_file,
            &format!(
                "{} | 轮询 {} 次 | 题目总数 {}",
                summary.message, summary.attempts, summary.total_questions
            ),
        )?;

        Ok(summary)
    }

    /// 恢复试卷草稿
    async fn load_draft(&self) -> Result<()> {
        let path = Path::new(&self.config.draft_file);
        match load_exam_draft(path).await? {
            Some(draft) if !draft.questions.is_empty() => {
                info!(
                    "📄 已恢复试卷草稿: {} 道题目 ({})",
                    draft.questions.len(),
                    path.display()
                );
                self.tracker.import_records(draft.questions);
            }
            _ => info!("📄 未找到试卷草稿，从空白题目开始"),
        }
        Ok(())
    }

    /// 导入题库，没有配置题库文件夹时跳过
    async fn import_question_banks(&self) -> Result<()> {
        let folder = self.config.question_bank_folder.trim();
        if folder.is_empty() {
            return Ok(());
        }

        info!("\n📁 正在扫描题库文件夹...");
        let banks = load_all_question_banks(folder).await?;

        for bank in banks {
            let source = bank.file_path.as_deref().unwrap_or("-");
            let records = materialize(&bank.questions);
            let imported = records.len();
            let total = self.tracker.import_records(records);
            info!(
                "✓ 已导入题库 {} ({}): {} 道题目，当前共 {} 道",
                bank.name, source, imported, total
            );
            logging::append_log_line(
                &self.config.output_log_file,
                &format!("导入题库 {} | 来源 {} | {} 道题目", bank.name, source, imported),
            )?;
        }
        Ok(())
    }

    /// 等待终止事件；期间收到 Ctrl-C 时取消任务
    async fn wait_for_outcome(&mut self, key: ReferenceKey) -> Result<RunSummary> {
        let mut ctrl_c_armed = true;

        let event = loop {
            tokio::select! {
                biased;
                event = self.events.recv() => {
                    let event = event.context("事件通道已关闭")?;
                    if event.is_terminal() {
                        break event;
                    }
                    if let TrackerEvent::Progress { progress, .. } = &event {
                        info!("[任务 {}] 📊 {}", key, progress);
                    }
                }
                signal = tokio::signal::ctrl_c(), if ctrl_c_armed => {
                    match signal {
                        Ok(()) => {
                            warn!("[任务 {}] 收到 Ctrl-C，正在取消", key);
                            self.tracker.cancel_generation();
                        }
                        Err(e) => {
                            warn!("无法监听 Ctrl-C: {}", e);
                            ctrl_c_armed = false;
                        }
                    }
                }
            }
        };

        let message = event.message().unwrap_or_default();
        match &event {
            TrackerEvent::Succeeded { .. } => info!("[任务 {}] ✅ {}", key, message),
            TrackerEvent::TimedOut { .. } | TrackerEvent::Failed { .. } => {
                error!("[任务 {}] ❌ {}", key, message);
                self.write_warning(Some(&key), &message).await;
            }
            _ => info!("[任务 {}] {}", key, message),
        }

        Ok(RunSummary {
            outcome: event.status(),
            reference_key: Some(key),
            attempts: self.tracker.attempt_count(),
            total_questions: self.tracker.questions().len(),
            message,
        })
    }

    /// 保存试卷草稿；只有一道空白题目时不写文件
    async fn save_draft(&self) -> Result<()> {
        let questions = self.tracker.questions();
        if is_untouched(&questions) {
            return Ok(());
        }

        let draft = ExamDraft {
            subject: self.config.subject.clone(),
            questions,
        };
        save_exam_draft(Path::new(&self.config.draft_file), &draft).await?;
        info!(
            "💾 试卷草稿已保存: {} ({} 道题目)",
            self.config.draft_file,
            draft.questions.len()
        );
        Ok(())
    }

    async fn write_warning(&self, key: Option<&ReferenceKey>, reason: &str) {
        if let Err(e) = self
            .warn_writer
            .write(key, &self.config.subject, reason)
            .await
        {
            error!("写入 {} 失败: {}", self.warn_writer.path(), e);
        }
    }
}

fn is_untouched(questions: &[CanonicalRecord]) -> bool {
    questions.len() == 1 && questions[0].is_blank()
}

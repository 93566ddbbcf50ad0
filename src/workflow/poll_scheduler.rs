//! 轮询调度 - 流程层
//!
//! 核心职责：对一个已提交的生成任务按固定间隔查询状态，直到进入终止状态
//!
//! 状态流转：
//! `Idle -> Polling -> {Succeeded, TimedOut, Failed, Cancelled}`
//!
//! - 每次 tick：轮询次数 +1，发出一次状态查询，然后分类结果
//! - 查询在同一个循环里顺序执行，上一次结果分类完成前不会开始下一次
//! - 查询出错立即失败，不重试
//! - 取消会同步释放定时器；已经发出的查询不会被中断，但结果会被丢弃
//! - 回调内部可以再次调用 `cancel`

use chrono::Local;
use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::PollError;
use crate::infrastructure::HttpClient;
use crate::models::{Job, JobStatus, PollSettings, RawItem, ReferenceKey};
use crate::services::JobClient;

/// 轮询过程中通知给调用方的事件
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// 本次查询尚未拿到结果
    Progress { attempt: u32 },
    Succeeded { items: Vec<RawItem> },
    TimedOut,
    Failed { error: PollError },
    Cancelled,
}

impl PollEvent {
    pub fn status(&self) -> JobStatus {
        match self {
            PollEvent::Progress { .. } => JobStatus::Polling,
            PollEvent::Succeeded { .. } => JobStatus::Succeeded,
            PollEvent::TimedOut => JobStatus::TimedOut,
            PollEvent::Failed { .. } => JobStatus::Failed,
            PollEvent::Cancelled => JobStatus::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

/// 状态回调
pub type PollCallback = Arc<dyn Fn(PollEvent) + Send + Sync>;

#[derive(Default)]
struct PollState {
    job: Option<Job>,
    /// 每次 start 递增，用于识别过期的查询结果
    epoch: u64,
    timer: Option<CancellationToken>,
    on_status: Option<PollCallback>,
}

impl PollState {
    /// 当前 epoch 且仍在轮询中的任务
    fn polling_job_mut(&mut self, epoch: u64) -> Option<&mut Job> {
        if self.epoch != epoch {
            return None;
        }
        self.job
            .as_mut()
            .filter(|job| job.status == JobStatus::Polling)
    }

    /// 进入终止状态
    ///
    /// 只有从 Polling 转换时才生效：释放定时器并交出回调，保证每个任务只回调一次终止事件
    fn finish(&mut self, status: JobStatus) -> Option<PollCallback> {
        let job = self.job.as_mut()?;
        if job.status != JobStatus::Polling {
            return None;
        }
        job.status = status;
        job.finished_at = Some(Local::now());

        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.on_status.take()
    }
}

thread_local! {
    // 当前线程正在为哪个调度器发出回调（Shared 的地址，0 表示没有）
    static EMITTING: Cell<usize> = Cell::new(0);
}

/// 回调结束后恢复 `EMITTING`
struct EmitScope(usize);

impl Drop for EmitScope {
    fn drop(&mut self) {
        EMITTING.with(|emitting| emitting.set(self.0));
    }
}

struct Shared {
    state: Mutex<PollState>,
    // 回调按顺序发出，取消之后不会再有进度事件
    emit: Mutex<()>,
}

/// 轮询状态的共享视图，可以被克隆到其他任务中读取状态或取消
#[derive(Clone)]
pub struct PollStateHandle {
    shared: Arc<Shared>,
}

impl PollStateHandle {
    fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PollState::default()),
                emit: Mutex::new(()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PollState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.shared) as usize
    }

    /// 回调内重入时已经持有发出锁，返回 None
    fn emit_guard(&self) -> Option<MutexGuard<'_, ()>> {
        if EMITTING.with(Cell::get) == self.id() {
            return None;
        }
        Some(
            self.shared
                .emit
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    fn emit(&self, callback: &PollCallback, event: PollEvent) {
        let _scope = EmitScope(EMITTING.with(|emitting| emitting.replace(self.id())));
        callback(event);
    }

    /// 当前任务状态，没有任务时为 Idle
    pub fn status(&self) -> JobStatus {
        self.state()
            .job
            .as_ref()
            .map_or(JobStatus::Idle, |job| job.status)
    }

    pub fn attempt_count(&self) -> u32 {
        self.state().job.as_ref().map_or(0, |job| job.attempt_count)
    }

    /// 当前任务的快照
    pub fn job(&self) -> Option<Job> {
        self.state().job.clone()
    }

    /// 取消正在轮询的任务
    ///
    /// 不在轮询中时什么都不做
    ///
    /// # 返回
    /// 是否发生了状态转换
    pub fn cancel(&self) -> bool {
        let _emit = self.emit_guard();

        let (callback, key) = {
            let mut state = self.state();
            let key = state.job.as_ref().map(|job| job.reference_key.clone());
            (state.finish(JobStatus::Cancelled), key)
        };

        match callback {
            Some(callback) => {
                if let Some(key) = key {
                    info!("[任务 {}] 🛑 已取消轮询", key);
                }
                self.emit(&callback, PollEvent::Cancelled);
                true
            }
            None => false,
        }
    }
}

/// 轮询调度器
///
/// 职责：
/// - 同一时间只跟踪一个任务
/// - 持有定时器，终止或取消时释放
/// - 不关心题目内容，只把原始结果交给回调
pub struct PollScheduler<H> {
    client: Arc<JobClient<H>>,
    handle: PollStateHandle,
}

impl<H: HttpClient> PollScheduler<H> {
    pub fn new(client: Arc<JobClient<H>>) -> Self {
        Self {
            client,
            handle: PollStateHandle::new(),
        }
    }

    pub fn client(&self) -> &Arc<JobClient<H>> {
        &self.client
    }

    pub fn handle(&self) -> PollStateHandle {
        self.handle.clone()
    }

    /// 开始轮询
    ///
    /// 第一次查询在一个间隔之后发出。已有任务在轮询时拒绝
    pub fn start(
        &self,
        reference_key: ReferenceKey,
        settings: PollSettings,
        on_status: PollCallback,
    ) -> Result<(), PollError> {
        let token = CancellationToken::new();

        let epoch = {
            let mut state = self.handle.state();
            if let Some(job) = state.job.as_ref() {
                if job.status == JobStatus::Polling {
                    return Err(PollError::AlreadyPolling {
                        reference_key: job.reference_key.to_string(),
                    });
                }
            }
            state.epoch += 1;
            state.job = Some(Job::new(reference_key.clone()));
            state.timer = Some(token.clone());
            state.on_status = Some(on_status);
            state.epoch
        };

        info!(
            "[任务 {}] ⏳ 开始轮询: 间隔 {}s, 最多 {} 次",
            reference_key,
            settings.interval.as_secs_f32(),
            settings.max_attempts
        );

        tokio::spawn(run_poll_loop(
            self.client.clone(),
            self.handle.clone(),
            reference_key,
            settings,
            epoch,
            token,
        ));

        Ok(())
    }

    /// 取消正在轮询的任务，见 [`PollStateHandle::cancel`]
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    pub fn status(&self) -> JobStatus {
        self.handle.status()
    }

    pub fn attempt_count(&self) -> u32 {
        self.handle.attempt_count()
    }

    pub fn job(&self) -> Option<Job> {
        self.handle.job()
    }
}

impl<H> Drop for PollScheduler<H> {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

async fn run_poll_loop<H: HttpClient>(
    client: Arc<JobClient<H>>,
    handle: PollStateHandle,
    key: ReferenceKey,
    settings: PollSettings,
    epoch: u64,
    token: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + settings.interval, settings.interval);
    // 查询比间隔慢时跳过错过的 tick，不补发
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("[任务 {}] 定时器已释放", key);
                return;
            }
            _ = ticker.tick() => {}
        }

        let attempt = {
            let mut state = handle.state();
            match state.polling_job_mut(epoch) {
                Some(job) => {
                    job.attempt_count += 1;
                    job.attempt_count
                }
                None => return,
            }
        };

        debug!(
            "[任务 {}] 第 {}/{} 次查询",
            key, attempt, settings.max_attempts
        );

        let outcome = client.check_status(&key).await;

        let _emit = handle.emit_guard();
        let (callback, event) = {
            let mut state = handle.state();
            if state.polling_job_mut(epoch).is_none() {
                debug!("[任务 {}] 丢弃过期的第 {} 次查询结果", key, attempt);
                return;
            }

            match outcome {
                Ok(items) if !items.is_empty() => (
                    state.finish(JobStatus::Succeeded),
                    PollEvent::Succeeded { items },
                ),
                Ok(_) if attempt >= settings.max_attempts => {
                    (state.finish(JobStatus::TimedOut), PollEvent::TimedOut)
                }
                Ok(_) => (state.on_status.clone(), PollEvent::Progress { attempt }),
                Err(error) => (
                    state.finish(JobStatus::Failed),
                    PollEvent::Failed { error },
                ),
            }
        };

        log_event(&key, attempt, &settings, &event);

        let terminal = event.is_terminal();
        if let Some(callback) = callback {
            handle.emit(&callback, event);
        }
        if terminal {
            return;
        }
    }
}

fn log_event(key: &ReferenceKey, attempt: u32, settings: &PollSettings, event: &PollEvent) {
    match event {
        PollEvent::Progress { .. } => info!(
            "[任务 {}] ⏳ 第 {}/{} 次查询: 尚未生成完成",
            key, attempt, settings.max_attempts
        ),
        PollEvent::Succeeded { items } => info!(
            "[任务 {}] ✓ 生成完成: {} 道题目 (第 {} 次查询)",
            key,
            items.len(),
            attempt
        ),
        PollEvent::TimedOut => warn!(
            "[任务 {}] ⚠️ 已查询 {} 次仍未完成，判定超时",
            key, attempt
        ),
        PollEvent::Failed { error } => {
            error!("[任务 {}] ❌ 第 {} 次查询失败: {}", key, attempt, error)
        }
        PollEvent::Cancelled => {}
    }
}

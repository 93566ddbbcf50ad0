//! 生成任务控制器 - 编排层
//!
//! 对外的唯一入口：提交 → 轮询 → 转换 → 合并，并把每一步转换成事件通知调用方。
//! 所有错误都在这里收口，调用方只会收到 `TrackerError` 或 `TrackerEvent`。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{error, info};

use crate::error::{PollError, TrackerError};
use crate::infrastructure::HttpClient;
use crate::models::{
    CanonicalRecord, GenerationRequest, JobStatus, PollSettings, ProgressEstimate, ReferenceKey,
};
use crate::services::materializer::{self, next_record_id};
use crate::services::JobClient;
use crate::workflow::{PollCallback, PollEvent, PollScheduler, PollStateHandle};

/// 控制器发给调用方的事件
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    Progress {
        reference_key: ReferenceKey,
        progress: ProgressEstimate,
    },
    Succeeded {
        reference_key: ReferenceKey,
        /// 本次生成并转换后的题目
        records: Vec<CanonicalRecord>,
        /// 合并后题目列表的总数
        total_questions: usize,
    },
    TimedOut {
        reference_key: ReferenceKey,
        attempts: u32,
        waited: Duration,
    },
    Failed {
        reference_key: ReferenceKey,
        error: PollError,
    },
    Cancelled {
        reference_key: ReferenceKey,
    },
}

impl TrackerEvent {
    pub fn status(&self) -> JobStatus {
        match self {
            TrackerEvent::Progress { .. } => JobStatus::Polling,
            TrackerEvent::Succeeded { .. } => JobStatus::Succeeded,
            TrackerEvent::TimedOut { .. } => JobStatus::TimedOut,
            TrackerEvent::Failed { .. } => JobStatus::Failed,
            TrackerEvent::Cancelled { .. } => JobStatus::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn reference_key(&self) -> &ReferenceKey {
        match self {
            TrackerEvent::Progress { reference_key, .. }
            | TrackerEvent::Succeeded { reference_key, .. }
            | TrackerEvent::TimedOut { reference_key, .. }
            | TrackerEvent::Failed { reference_key, .. }
            | TrackerEvent::Cancelled { reference_key } => reference_key,
        }
    }

    /// 给用户看的提示
    ///
    /// 每个终止事件恰好一条，进度事件没有
    pub fn message(&self) -> Option<String> {
        match self {
            TrackerEvent::Progress { .. } => None,
            TrackerEvent::Succeeded { records, .. } => {
                Some(format!("成功生成 {} 道题目", records.len()))
            }
            TrackerEvent::TimedOut { waited, .. } => Some(format!(
                "题目生成超时（已等待 {} 分钟），请稍后重试",
                waited.as_secs() / 60
            )),
            TrackerEvent::Failed { error, .. } => Some(format!("题目生成失败: {}", error)),
            TrackerEvent::Cancelled { .. } => Some("已取消题目生成".to_string()),
        }
    }
}

pub type TrackerCallback = Arc<dyn Fn(TrackerEvent) + Send + Sync>;

/// 控制器状态的只读视图，另外可以取消任务
///
/// 可以克隆到其他任务（例如 Ctrl-C 处理）中使用
#[derive(Clone)]
pub struct TrackerHandle {
    poll: PollStateHandle,
    submitting: Arc<AtomicBool>,
    settings: PollSettings,
}

impl TrackerHandle {
    pub fn status(&self) -> JobStatus {
        if self.submitting.load(Ordering::SeqCst) {
            JobStatus::Submitting
        } else {
            self.poll.status()
        }
    }

    pub fn attempt_count(&self) -> u32 {
        self.poll.attempt_count()
    }

    /// 当前任务的进度估计，没有任务时为 None
    pub fn progress(&self) -> Option<ProgressEstimate> {
        self.poll
            .job()
            .map(|job| ProgressEstimate::new(job.attempt_count, &self.settings))
    }

    pub fn cancel(&self) -> bool {
        self.poll.cancel()
    }
}

/// 提交期间置位，离开作用域时复位
struct SubmittingGuard<'a>(&'a AtomicBool);

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 生成任务控制器
///
/// 职责：
/// - 同一时间只允许一个任务（提交中或轮询中时拒绝新的任务）
/// - 提交成功后启动轮询，成功结果转换后合并进题目列表
/// - 持有题目列表，所有导入渠道都经过同一个合并规则
pub struct TrackerController<H> {
    client: Arc<JobClient<H>>,
    scheduler: PollScheduler<H>,
    settings: PollSettings,
    questions: Arc<Mutex<Vec<CanonicalRecord>>>,
    submitting: Arc<AtomicBool>,
    on_event: TrackerCallback,
}

impl<H: HttpClient> TrackerController<H> {
    /// 创建控制器，题目列表初始为一道空白题目
    pub fn new(client: JobClient<H>, settings: PollSettings, on_event: TrackerCallback) -> Self {
        let client = Arc::new(client);
        Self {
            scheduler: PollScheduler::new(client.clone()),
            client,
            settings,
            questions: Arc::new(Mutex::new(vec![CanonicalRecord::blank(next_record_id())])),
            submitting: Arc::new(AtomicBool::new(false)),
            on_event,
        }
    }

    pub fn client(&self) -> &Arc<JobClient<H>> {
        &self.client
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    pub fn handle(&self) -> TrackerHandle {
        TrackerHandle {
            poll: self.scheduler.handle(),
            submitting: self.submitting.clone(),
            settings: self.settings,
        }
    }

    /// 提交生成请求并开始轮询
    ///
    /// 提交失败时返回分类后的错误，状态保持 Idle
    pub async fn start_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<ReferenceKey, TrackerError> {
        if self
            .submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TrackerError::JobActive {
                reference_key: "提交中".to_string(),
            });
        }
        // 一直持有到轮询开始，中间不会出现 Idle
        let _submitting = SubmittingGuard(&self.submitting);

        if let Some(job) = self.scheduler.job() {
            if job.status == JobStatus::Polling {
                return Err(TrackerError::JobActive {
                    reference_key: job.reference_key.to_string(),
                });
            }
        }

        info!(
            "📤 提交生成请求: 科目 {}, 难度 {}, 数量 {}, 语言 {}",
            request.subject, request.critical, request.question_count, request.language
        );
        let key = self.client.submit(request).await.map_err(|e| {
            error!("❌ 提交生成请求失败: {}", e);
            TrackerError::Submission(e)
        })?;

        info!("[任务 {}] ✓ 生成请求已受理", key);

        let callback = self.poll_callback(key.clone());
        self.scheduler.start(key.clone(), self.settings, callback)?;

        Ok(key)
    }

    /// 取消当前任务，任何时候调用都是安全的
    pub fn cancel_generation(&self) -> bool {
        self.scheduler.cancel()
    }

    pub fn status(&self) -> JobStatus {
        self.handle().status()
    }

    pub fn attempt_count(&self) -> u32 {
        self.scheduler.attempt_count()
    }

    pub fn progress(&self) -> Option<ProgressEstimate> {
        self.handle().progress()
    }

    pub fn reference_key(&self) -> Option<ReferenceKey> {
        self.scheduler.job().map(|job| job.reference_key)
    }

    /// 当前题目列表的快照
    pub fn questions(&self) -> Vec<CanonicalRecord> {
        lock(&self.questions).clone()
    }

    /// 从其他渠道（题库、草稿）导入题目，合并规则与 AI 生成相同
    ///
    /// # 返回
    /// 合并后的题目总数
    pub fn import_records(&self, records: Vec<CanonicalRecord>) -> usize {
        merge_into(&self.questions, records)
    }

    /// 直接替换题目列表；传入空列表时恢复为一道空白题目
    pub fn replace_questions(&self, records: Vec<CanonicalRecord>) {
        let records = if records.is_empty() {
            vec![CanonicalRecord::blank(next_record_id())]
        } else {
            records
        };
        *lock(&self.questions) = records;
    }

    fn poll_callback(&self, reference_key: ReferenceKey) -> PollCallback {
        let questions = self.questions.clone();
        let on_event = self.on_event.clone();
        let settings = self.settings;

        Arc::new(move |event| {
            let reference_key = reference_key.clone();
            let tracker_event = match event {
                PollEvent::Progress { attempt } => TrackerEvent::Progress {
                    reference_key,
                    progress: ProgressEstimate::new(attempt, &settings),
                },
                PollEvent::Succeeded { items } => {
                    let records = materializer::materialize(&items);
                    let total_questions = merge_into(&questions, records.clone());
                    TrackerEvent::Succeeded {
                        reference_key,
                        records,
                        total_questions,
                    }
                }
                PollEvent::TimedOut => TrackerEvent::TimedOut {
                    reference_key,
                    attempts: settings.max_attempts,
                    waited: settings.ceiling(),
                },
                PollEvent::Failed { error } => TrackerEvent::Failed {
                    reference_key,
                    error,
                },
                PollEvent::Cancelled => TrackerEvent::Cancelled { reference_key },
            };
            on_event(tracker_event);
        })
    }
}

fn lock(questions: &Mutex<Vec<CanonicalRecord>>) -> MutexGuard<'_, Vec<CanonicalRecord>> {
    questions
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn merge_into(questions: &Mutex<Vec<CanonicalRecord>>, incoming: Vec<CanonicalRecord>) -> usize {
    let mut guard = lock(questions);
    let existing = std::mem::take(&mut *guard);
    *guard = materializer::merge(existing, incoming);
    guard.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HttpError, SubmissionError};
    use crate::infrastructure::mock::{envelope, raw_items_json, MockHttpClient};
    use crate::models::RawItem;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time;

    fn tracker(
        http: MockHttpClient,
    ) -> (
        TrackerController<MockHttpClient>,
        mpsc::UnboundedReceiver<TrackerEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let on_event: TrackerCallback = Arc::new(move |event| {
            let _ = tx.send(event);
        });
        let client = JobClient::new(http, "api/generate", "api/status");
        (
            TrackerController::new(client, PollSettings::default(), on_event),
            rx,
        )
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            subject: "Math".to_string(),
            critical: "HIGH".to_string(),
            question_count: "10".to_string(),
            language: "English".to_string(),
        }
    }

    async fn next_terminal(rx: &mut mpsc::UnboundedReceiver<TrackerEvent>) -> TrackerEvent {
        loop {
            let event = rx.recv().await.expect("事件通道提前关闭");
            if event.is_terminal() {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn test_generation_end_to_end() {
        time::pause();
        let http = MockHttpClient::new()
            .with_post(Ok(envelope(json!("ref-123"))))
            .with_empty_gets(2)
            .with_get(Ok(envelope(raw_items_json(10))));
        let (tracker, mut rx) = tracker(http);

        let key = tracker.start_generation(&request()).await.unwrap();
        assert_eq!(key.as_str(), "ref-123");
        assert_eq!(tracker.status(), JobStatus::Polling);

        let first = rx.recv().await.unwrap();
        match &first {
            TrackerEvent::Progress { progress, .. } => {
                assert_eq!(progress.attempt, 1);
                assert_eq!(progress.elapsed, Duration::from_secs(30));
            }
            other => panic!("期望进度事件，实际: {:?}", other),
        }
        assert!(first.message().is_none());

        let event = next_terminal(&mut rx).await;
        assert_eq!(tracker.attempt_count(), 3);
        assert_eq!(tracker.status(), JobStatus::Succeeded);

        match &event {
            TrackerEvent::Succeeded {
                reference_key,
                records,
                total_questions,
            } => {
                assert_eq!(reference_key.as_str(), "ref-123");
                assert_eq!(records.len(), 10);
                assert_eq!(*total_questions, 10);
                for record in records {
                    let answer = record.correct_answer.unwrap();
                    assert!(answer <= 3);
                }
            }
            other => panic!("期望成功，实际: {:?}", other),
        }
        assert_eq!(event.message().unwrap(), "成功生成 10 道题目");

        // 初始的空白题目被替换
        let questions = tracker.questions();
        assert_eq!(questions.len(), 10);
        assert!(questions.iter().all(|q| !q.is_blank()));
    }

    #[tokio::test]
    async fn test_submission_failure_leaves_idle() {
        time::pause();
        let http = MockHttpClient::new().with_post(Err(HttpError::Transport(
            "connection refused".to_string(),
        )));
        let (tracker, mut rx) = tracker(http);

        let err = tracker.start_generation(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            TrackerError::Submission(SubmissionError::Network { .. })
        ));
        assert_eq!(tracker.status(), JobStatus::Idle);
        assert!(tracker.reference_key().is_none());
        assert!(tracker.progress().is_none());

        time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(tracker.client().http().get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_second_generation_rejected_while_active() {
        time::pause();
        let http = MockHttpClient::new()
            .with_post(Ok(envelope(json!("ref-1"))))
            .with_post(Ok(envelope(json!("ref-2"))));
        let (tracker, _rx) = tracker(http);

        tracker.start_generation(&request()).await.unwrap();
        let err = tracker.start_generation(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            TrackerError::JobActive { ref reference_key } if reference_key == "ref-1"
        ));
        assert_eq!(tracker.client().http().post_calls.lock().unwrap().len(), 1);

        // 取消后可以重新开始
        assert!(tracker.cancel_generation());
        let key = tracker.start_generation(&request()).await.unwrap();
        assert_eq!(key.as_str(), "ref-2");
    }

    #[tokio::test]
    async fn test_timeout_reports_exactly_one_terminal_event() {
        time::pause();
        let http = MockHttpClient::new().with_post(Ok(envelope(json!("ref-slow"))));
        let (tracker, mut rx) = tracker(http);

        tracker.start_generation(&request()).await.unwrap();

        let mut progress_count = 0;
        let mut terminal = Vec::new();
        while let Some(event) = rx.recv().await {
            if event.is_terminal() {
                terminal.push(event);
                break;
            }
            progress_count += 1;
        }
        time::sleep(Duration::from_secs(600)).await;
        while let Ok(event) = rx.try_recv() {
            terminal.push(event);
        }

        assert_eq!(progress_count, 19);
        assert_eq!(terminal.len(), 1);
        assert!(matches!(terminal[0], TrackerEvent::TimedOut { attempts: 20, .. }));
        assert_eq!(
            terminal[0].message().unwrap(),
            "题目生成超时（已等待 10 分钟），请稍后重试"
        );
        assert_eq!(tracker.attempt_count(), 20);
        // 超时不改动题目列表
        assert_eq!(tracker.questions().len(), 1);
        assert!(tracker.questions()[0].is_blank());
    }

    #[tokio::test]
    async fn test_cancel_through_handle() {
        time::pause();
        let http = MockHttpClient::new().with_post(Ok(envelope(json!("ref-c"))));
        let (tracker, mut rx) = tracker(http);
        let handle = tracker.handle();

        tracker.start_generation(&request()).await.unwrap();
        assert!(matches!(rx.recv().await, Some(TrackerEvent::Progress { .. })));
        assert_eq!(handle.progress().unwrap().attempt, 1);

        assert!(handle.cancel());
        let event = rx.try_recv().unwrap();
        assert!(matches!(event, TrackerEvent::Cancelled { .. }));
        assert_eq!(event.message().unwrap(), "已取消题目生成");

        assert!(!tracker.cancel_generation());
        assert_eq!(handle.status(), JobStatus::Cancelled);

        time::sleep(Duration::from_secs(300)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_poll_failure_event_message() {
        time::pause();
        let http = MockHttpClient::new()
            .with_post(Ok(envelope(json!("ref-f"))))
            .with_get(Err(HttpError::Status {
                status: 500,
                body: "internal error".to_string(),
            }));
        let (tracker, mut rx) = tracker(http);

        tracker.start_generation(&request()).await.unwrap();
        let event = next_terminal(&mut rx).await;

        assert!(matches!(event, TrackerEvent::Failed { .. }));
        assert!(event.message().unwrap().starts_with("题目生成失败"));
        assert_eq!(tracker.status(), JobStatus::Failed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_from_event_callback() {
        let http = MockHttpClient::new().with_post(Ok(envelope(json!("ref-cb"))));
        let slot: Arc<std::sync::OnceLock<TrackerHandle>> = Arc::new(std::sync::OnceLock::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle_slot = slot.clone();
        let on_event: TrackerCallback = Arc::new(move |event| {
            let is_progress = matches!(event, TrackerEvent::Progress { .. });
            let _ = tx.send(event);
            if is_progress {
                if let Some(handle) = handle_slot.get() {
                    handle.cancel();
                }
            }
        });
        let client = JobClient::new(http, "api/generate", "api/status");
        let settings = PollSettings::new(Duration::from_millis(20), 20);
        let tracker = TrackerController::new(client, settings, on_event);
        let _ = slot.set(tracker.handle());

        tracker.start_generation(&request()).await.unwrap();

        let events = time::timeout(Duration::from_secs(5), async {
            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                let terminal = event.is_terminal();
                events.push(event);
                if terminal {
                    break;
                }
            }
            events
        })
        .await
        .expect("在回调中取消不应阻塞");

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], TrackerEvent::Progress { .. }));
        assert!(matches!(events[1], TrackerEvent::Cancelled { .. }));
        assert_eq!(tracker.status(), JobStatus::Cancelled);
        assert_eq!(tracker.attempt_count(), 1);

        time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_start_rejected_during_submission() {
        time::pause();
        let release = Arc::new(tokio::sync::Notify::new());
        let http = MockHttpClient::new()
            .with_post(Ok(envelope(json!("ref-1"))))
            .hold_post(release.clone());
        let (tracker, _rx) = tracker(http);

        let first_request = request();
        let (first, second) = tokio::join!(tracker.start_generation(&first_request), async {
            while tracker.client().http().post_calls.lock().unwrap().is_empty() {
                tokio::task::yield_now().await;
            }
            assert_eq!(tracker.status(), JobStatus::Submitting);
            let result = tracker.start_generation(&request()).await;
            release.notify_one();
            result
        });

        assert_eq!(first.unwrap().as_str(), "ref-1");
        assert!(matches!(
            second,
            Err(TrackerError::JobActive { ref reference_key }) if reference_key == "提交中"
        ));
        // 第二次调用没有发出请求
        assert_eq!(tracker.client().http().post_calls.lock().unwrap().len(), 1);
        assert_eq!(tracker.status(), JobStatus::Polling);
    }

    #[tokio::test]
    async fn test_all_import_channels_share_merge_rule() {
        time::pause();
        let http = MockHttpClient::new()
            .with_post(Ok(envelope(json!("ref-m"))))
            .with_get(Ok(envelope(raw_items_json(2))));
        let (tracker, mut rx) = tracker(http);

        // 题库导入替换初始的空白题目
        let bank = materializer::materialize(&[RawItem {
            question: "Bank question".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            correct_answer: "b".to_string(),
        }]);
        assert_eq!(tracker.import_records(bank.clone()), 1);
        assert_eq!(tracker.questions(), bank);

        // AI 结果追加在后面
        tracker.start_generation(&request()).await.unwrap();
        match next_terminal(&mut rx).await {
            TrackerEvent::Succeeded {
                total_questions, ..
            } => assert_eq!(total_questions, 3),
            other => panic!("期望成功，实际: {:?}", other),
        }
        assert_eq!(tracker.questions()[0], bank[0]);

        tracker.replace_questions(Vec::new());
        assert_eq!(tracker.questions().len(), 1);
        assert!(tracker.questions()[0].is_blank());
    }
}

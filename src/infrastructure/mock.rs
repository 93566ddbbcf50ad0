//! 测试用的脚本化 HTTP 客户端

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

use super::HttpClient;
use crate::error::HttpError;

/// 按顺序返回预设响应；GET 队列用完后一直返回空列表
pub(crate) struct MockHttpClient {
    post_replies: Mutex<VecDeque<Result<JsonValue, HttpError>>>,
    get_replies: Mutex<VecDeque<Result<JsonValue, HttpError>>>,
    get_delay: Duration,
    hold_call: Option<(usize, Arc<Notify>)>,
    hold_post: Option<Arc<Notify>>,
    started: Option<mpsc::UnboundedSender<usize>>,
    pub post_calls: Mutex<Vec<(String, JsonValue)>>,
    pub get_calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self {
            post_replies: Mutex::new(VecDeque::new()),
            get_replies: Mutex::new(VecDeque::new()),
            get_delay: Duration::ZERO,
            hold_call: None,
            hold_post: None,
            started: None,
            post_calls: Mutex::new(Vec::new()),
            get_calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_post(self, reply: Result<JsonValue, HttpError>) -> Self {
        self.post_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_get(self, reply: Result<JsonValue, HttpError>) -> Self {
        self.get_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_empty_gets(self, count: usize) -> Self {
        for _ in 0..count {
            self.get_replies.lock().unwrap().push_back(Ok(envelope(json!([]))));
        }
        self
    }

    /// 每次 GET 都等待这么久才返回
    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = delay;
        self
    }

    /// 第 `call` 次 GET 在 `release` 被通知之前不返回
    pub fn hold_get_call(mut self, call: usize, release: Arc<Notify>) -> Self {
        self.hold_call = Some((call, release));
        self
    }

    /// POST 在 `release` 被通知之前不返回
    pub fn hold_post(mut self, release: Arc<Notify>) -> Self {
        self.hold_post = Some(release);
        self
    }

    /// 每次 GET 开始时发送调用序号（从 1 开始）
    pub fn notify_get_started(mut self, tx: mpsc::UnboundedSender<usize>) -> Self {
        self.started = Some(tx);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.get_calls.lock().unwrap().len()
    }
}

impl HttpClient for MockHttpClient {
    fn post_json<'a>(
        &'a self,
        path: &'a str,
        body: JsonValue,
    ) -> BoxFuture<'a, Result<JsonValue, HttpError>> {
        async move {
            self.post_calls.lock().unwrap().push((path.to_string(), body));
            if let Some(release) = &self.hold_post {
                release.notified().await;
            }
            self.post_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::Transport("没有预设的 POST 响应".to_string())))
        }
        .boxed()
    }

    fn get_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<JsonValue, HttpError>> {
        async move {
            let call = {
                let mut calls = self.get_calls.lock().unwrap();
                calls.push(path.to_string());
                calls.len()
            };
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(tx) = &self.started {
                let _ = tx.send(call);
            }
            if !self.get_delay.is_zero() {
                tokio::time::sleep(self.get_delay).await;
            }
            if let Some((held, release)) = &self.hold_call {
                if *held == call {
                    release.notified().await;
                }
            }

            let reply = self
                .get_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(envelope(json!([]))));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            reply
        }
        .boxed()
    }
}

/// 成功响应包
pub(crate) fn envelope(data: JsonValue) -> JsonValue {
    json!({ "success": true, "data": data })
}

/// 生成 `count` 道四选一原始题目
pub(crate) fn raw_items_json(count: usize) -> JsonValue {
    let items: Vec<JsonValue> = (0..count)
        .map(|i| {
            json!({
                "question": format!("第 {} 题: {} + 1 = ?", i + 1, i),
                "options": [
                    (i).to_string(),
                    (i + 1).to_string(),
                    (i + 2).to_string(),
                    (i + 3).to_string()
                ],
                "correctAnswer": (i + 1).to_string()
            })
        })
        .collect();
    JsonValue::Array(items)
}

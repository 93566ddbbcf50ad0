//! 出题任务客户端 - 业务能力层
//!
//! 只负责"提交生成请求"和"查询一次状态"，不关心轮询流程

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{PollError, SubmissionError};
use crate::infrastructure::HttpClient;
use crate::models::{ApiEnvelope, GenerationRequest, RawItem, ReferenceKey};

/// 出题任务客户端
///
/// 职责：
/// - 提交生成请求，拿到 reference key
/// - 按 reference key 查询一次生成结果
/// - 对失败分类，不做任何重试
pub struct JobClient<H> {
    http: H,
    generation_path: String,
    status_path: String,
}

impl<H: HttpClient> JobClient<H> {
    pub fn new(
        http: H,
        generation_path: impl Into<String>,
        status_path: impl Into<String>,
    ) -> Self {
        Self {
            http,
            generation_path: generation_path.into(),
            status_path: status_path.into(),
        }
    }

    /// 使用配置中的接口路径创建
    pub fn from_config(http: H, config: &Config) -> Self {
        Self::new(http, &config.generation_path, &config.status_path)
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    /// 提交生成请求
    ///
    /// # 返回
    /// 服务端分配的 reference key
    pub async fn submit(
        &self,
        request: &GenerationRequest,
    ) -> Result<ReferenceKey, SubmissionError> {
        if request.subject.trim().is_empty() {
            return Err(SubmissionError::InvalidRequest {
                reason: "科目不能为空".to_string(),
            });
        }

        let body = serde_json::to_value(request).map_err(|e| SubmissionError::Unexpected {
            reason: e.to_string(),
        })?;

        debug!("提交生成请求: {}", body);

        let response = self.http.post_json(&self.generation_path, body).await?;

        let envelope: ApiEnvelope<JsonValue> =
            serde_json::from_value(response).map_err(|e| SubmissionError::Unexpected {
                reason: format!("无法解析响应: {}", e),
            })?;

        if !envelope.success {
            warn!("生成请求被拒绝: {:?}", envelope.message);
            return Err(SubmissionError::ServerRejected {
                status: None,
                message: envelope.failure_message(),
            });
        }

        // key 可能是字符串，也可能是数字
        let key = match envelope.data {
            Some(JsonValue::String(s)) if !s.trim().is_empty() => s,
            Some(JsonValue::Number(n)) => n.to_string(),
            other => {
                return Err(SubmissionError::Unexpected {
                    reason: format!("响应中缺少 reference key: {:?}", other),
                })
            }
        };

        Ok(ReferenceKey::new(key))
    }

    /// 查询一次生成状态
    ///
    /// # 返回
    /// 生成的原始题目；空列表表示"尚未完成"
    pub async fn check_status(&self, key: &ReferenceKey) -> Result<Vec<RawItem>, PollError> {
        let path = format!("{}/{}", self.status_path.trim_end_matches('/'), key);

        let response = self.http.get_json(&path).await?;

        let envelope: ApiEnvelope<Vec<RawItem>> =
            serde_json::from_value(response).map_err(|e| PollError::Unexpected {
                reason: format!("无法解析状态响应: {}", e),
            })?;

        if !envelope.success {
            return Err(PollError::ServerRejected {
                status: None,
                message: envelope.failure_message(),
            });
        }

        let items = envelope.data.unwrap_or_default();
        debug!("[任务 {}] 状态查询返回 {} 道题目", key, items.len());

        Ok(items)
    }
}

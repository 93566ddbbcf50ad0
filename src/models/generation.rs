//! 出题服务的请求 / 响应结构

use serde::{Deserialize, Serialize};
use std::fmt;

/// 提交给 AI 出题服务的生成请求
///
/// 字段原样透传，不在客户端做范围校验
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// 科目标识，不能为空
    pub subject: String,
    /// 难度 / 重要程度，如 "HIGH"
    pub critical: String,
    /// 题目数量
    pub question_count: String,
    /// 出题语言
    pub language: String,
}

/// 服务端返回的任务标识，后续所有状态查询都用它关联
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceKey(String);

impl ReferenceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 出题服务生成的原始题目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// 正确答案的取值（不是下标）
    #[serde(default)]
    pub correct_answer: String,
}

/// 服务端统一响应包 `{success, data}`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// 失败时给出可读的原因
    pub fn failure_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "服务端返回 success=false".to_string())
    }
}

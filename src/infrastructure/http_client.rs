//! HTTP 客户端 - 基础设施层
//!
//! 持有唯一的 reqwest Client，只暴露"发 JSON / 取 JSON"的能力

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{Client, Url};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

use crate::error::HttpError;

/// HTTP 能力抽象
///
/// 职责：
/// - 发送请求，返回 JSON 响应体
/// - 把失败分为"有响应"（`Status`）和"无响应"（`Transport`）
/// - 不认识 Job / Question
pub trait HttpClient: Send + Sync + 'static {
    fn post_json<'a>(
        &'a self,
        path: &'a str,
        body: JsonValue,
    ) -> BoxFuture<'a, Result<JsonValue, HttpError>>;

    fn get_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<JsonValue, HttpError>>;
}

/// 基于 reqwest 的实现
pub struct ReqwestHttpClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl ReqwestHttpClient {
    /// 创建新的 HTTP 客户端
    ///
    /// # 参数
    /// - `base_url`: 服务根地址
    /// - `token`: 访问令牌，空字符串表示不鉴权
    /// - `timeout`: 单次请求超时
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, HttpError> {
        // 保证以 "/" 结尾，否则 join 会替换掉最后一段路径
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| HttpError::Transport(format!("无效的服务地址 {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let token = Some(token.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn url(&self, path: &str) -> Result<Url, HttpError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::Transport(format!("无效的接口路径 {}: {}", path, e)))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<JsonValue, HttpError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<JsonValue>()
            .await
            .map_err(|e| HttpError::Decode(e.to_string()))
    }
}

impl HttpClient for ReqwestHttpClient {
    fn post_json<'a>(
        &'a self,
        path: &'a str,
        body: JsonValue,
    ) -> BoxFuture<'a, Result<JsonValue, HttpError>> {
        async move {
            let url = self.url(path)?;
            debug!("POST {}", url);
            self.send(self.client.post(url).json(&body)).await
        }
        .boxed()
    }

    fn get_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<JsonValue, HttpError>> {
        async move {
            let url = self.url(path)?;
            debug!("GET {}", url);
            self.send(self.client.get(url)).await
        }
        .boxed()
    }
}

/// 请求没有拿到响应时的错误分类
fn classify_transport(err: reqwest::Error) -> HttpError {
    if let Some(status) = err.status() {
        HttpError::Status {
            status: status.as_u16(),
            body: err.to_string(),
        }
    } else if err.is_decode() {
        HttpError::Decode(err.to_string())
    } else {
        HttpError::Transport(err.to_string())
    }
}

use std::time::Duration;

use crate::error::ConfigError;
use crate::models::{GenerationRequest, PollSettings};

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    // --- 出题服务 API 配置 ---
    pub api_base_url: String,
    /// 访问令牌，为空时不带 Authorization 头
    pub api_token: String,
    /// 提交生成请求的接口路径
    pub generation_path: String,
    /// 查询生成状态的接口路径（后面拼接 reference key）
    pub status_path: String,
    /// 单次 HTTP 请求超时（秒）
    pub http_timeout_secs: u64,
    // --- 轮询配置 ---
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 最大轮询次数
    pub max_poll_attempts: u32,
    // --- 输出配置 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 失败记录文件
    pub warn_file: String,
    /// 试卷草稿文件（TOML）
    pub draft_file: String,
    /// 题库 TOML 文件夹，为空时不导入
    pub question_bank_folder: String,
    // --- 生成请求 ---
    pub subject: String,
    pub critical: String,
    pub question_count: String,
    pub language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            api_token: String::new(),
            generation_path: "api/ai/questions/generate".to_string(),
            status_path: "api/ai/questions/status".to_string(),
            http_timeout_secs: 60,
            poll_interval_ms: 30_000,
            max_poll_attempts: 20,
            verbose_logging: false,
            output_log_file: "generation.log".to_string(),
            warn_file: "warn.txt".to_string(),
            draft_file: "exam_draft.toml".to_string(),
            question_bank_folder: String::new(),
            subject: String::new(),
            critical: "MEDIUM".to_string(),
            question_count: "10".to_string(),
            language: "English".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(default.api_base_url),
            api_token: std::env::var("API_TOKEN").unwrap_or(default.api_token),
            generation_path: std::env::var("GENERATION_PATH").unwrap_or(default.generation_path),
            status_path: std::env::var("STATUS_PATH").unwrap_or(default.status_path),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.http_timeout_secs),
            poll_interval_ms: std::env::var("POLL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_interval_ms),
            max_poll_attempts: std::env::var("MAX_POLL_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_poll_attempts),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            warn_file: std::env::var("WARN_FILE").unwrap_or(default.warn_file),
            draft_file: std::env::var("DRAFT_FILE").unwrap_or(default.draft_file),
            question_bank_folder: std::env::var("QUESTION_BANK_FOLDER").unwrap_or(default.question_bank_folder),
            subject: std::env::var("GEN_SUBJECT").unwrap_or(default.subject),
            critical: std::env::var("GEN_CRITICAL").unwrap_or(default.critical),
            question_count: std::env::var("GEN_QUESTION_COUNT").unwrap_or(default.question_count),
            language: std::env::var("GEN_LANGUAGE").unwrap_or(default.language),
        }
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "API_BASE_URL",
                reason: "不能为空".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "POLL_INTERVAL_MS",
                reason: "必须大于 0".to_string(),
            });
        }
        if self.max_poll_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "MAX_POLL_ATTEMPTS",
                reason: "必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings::new(
            Duration::from_millis(self.poll_interval_ms),
            self.max_poll_attempts,
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// 由配置构建一次生成请求
    pub fn generation_request(&self) -> GenerationRequest {
        GenerationRequest {
            subject: self.subject.clone(),
            critical: self.critical.clone(),
            question_count: self.question_count.clone(),
            language: self.language.clone(),
        }
    }
}

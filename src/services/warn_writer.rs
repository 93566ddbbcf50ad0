//! 警告写入服务 - 业务能力层
//!
//! 只负责"写 warn.txt"能力：记录超时或失败的生成任务

use anyhow::Result;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::models::ReferenceKey;

/// 警告写入服务
///
/// 职责：
/// - 把没有拿到题目的生成任务追加写入 warn.txt
/// - 不关心任务为什么失败，只记录调用方给出的原因
pub struct WarnWriter {
    warn_file_path: String,
}

impl WarnWriter {
    pub fn new() -> Self {
        Self {
            warn_file_path: "warn.txt".to_string(),
        }
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            warn_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.warn_file_path
    }

    /// 写入警告信息
    ///
    /// # 参数
    /// - `reference_key`: 任务标识，提交失败时为 None
    /// - `subject`: 科目
    /// - `reason`: 失败原因
    pub async fn write(
        &self,
        reference_key: Option<&ReferenceKey>,
        subject: &str,
        reason: &str,
    ) -> Result<()> {
        let key = reference_key.map(|k| k.as_str()).unwrap_or("-");
        debug!("写入警告: 任务 {} | 科目 {} | 原因: {}", key, subject, reason);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.warn_file_path)
            .await?;

        let warn_msg = format!(
            "{} | 任务 {} | 科目 {} | 原因: {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            key,
            subject,
            reason
        );

        file.write_all(warn_msg.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

impl Default for WarnWriter {
    fn default() -> Self {
        Self::new()
    }
}

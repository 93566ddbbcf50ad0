use crate::models::question::{ExamDraft, QuestionBank};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载题库
pub async fn load_question_bank(toml_file_path: &Path) -> Result<QuestionBank> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取题库文件: {}", toml_file_path.display()))?;

    let mut bank: QuestionBank = toml::from_str(&content)
        .with_context(|| format!("无法解析题库文件: {}", toml_file_path.display()))?;

    bank.file_path = Some(toml_file_path.to_string_lossy().to_string());

    Ok(bank)
}

/// 从文件夹中加载所有题库文件
///
/// 单个文件解析失败只记录警告，不影响其他文件；结果按文件名排序
pub async fn load_all_question_banks(folder_path: &str) -> Result<Vec<QuestionBank>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut toml_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    let mut banks = Vec::new();
    for path in toml_files {
        tracing::info!(
            "正在加载题库: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_question_bank(&path).await {
            Ok(bank) => {
                tracing::info!("成功加载 {} 道题目", bank.questions.len());
                banks.push(bank);
            }
            Err(e) => {
                tracing::warn!("加载题库失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(banks)
}

/// 加载试卷草稿，文件不存在时返回 None
pub async fn load_exam_draft(toml_file_path: &Path) -> Result<Option<ExamDraft>> {
    if !fs::try_exists(toml_file_path).await.unwrap_or(false) {
        return Ok(None);
    }

    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取草稿文件: {}", toml_file_path.display()))?;

    let draft: ExamDraft = toml::from_str(&content)
        .with_context(|| format!("无法解析草稿文件: {}", toml_file_path.display()))?;

    Ok(Some(draft))
}

/// 保存试卷草稿
pub async fn save_exam_draft(toml_file_path: &Path, draft: &ExamDraft) -> Result<()> {
    let content = toml::to_string(draft).context("无法序列化试卷草稿")?;

    fs::write(toml_file_path, content)
        .await
        .with_context(|| format!("无法写入草稿文件: {}", toml_file_path.display()))?;

    Ok(())
}

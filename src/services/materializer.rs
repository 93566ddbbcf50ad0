//! 结果转换服务 - 业务能力层
//!
//! 把出题服务返回的原始题目转成统一的题目记录，并合并进已有题目列表。
//! AI 生成、题库导入、草稿加载都走同一个 `merge`。

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use crate::models::{CanonicalRecord, ContentKind, OptionEntry, RawItem};
use crate::utils::logging::truncate_text;

static RECORD_SEQ: AtomicU64 = AtomicU64::new(0);

/// 生成本地唯一的题目 id（时间戳 + 进程内序号）
pub fn next_record_id() -> String {
    let seq = RECORD_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("q-{}-{}", chrono::Utc::now().timestamp_millis(), seq)
}

/// 把原始题目转换为统一记录
///
/// 正确答案按取值在选项中查找下标；找不到时退回下标 0。
/// 这个退回是有损的（未匹配的答案会变成"第一个选项正确"），保留只是为了兼容。
pub fn materialize(raw_items: &[RawItem]) -> Vec<CanonicalRecord> {
    raw_items.iter().map(materialize_one).collect()
}

fn materialize_one(item: &RawItem) -> CanonicalRecord {
    let correct_answer = match item
        .options
        .iter()
        .position(|option| option == &item.correct_answer)
    {
        Some(index) => index,
        None => {
            warn!(
                "正确答案 '{}' 不在选项中，默认选择第一个选项 (题干: {})",
                item.correct_answer,
                truncate_text(&item.question, 40)
            );
            0
        }
    };

    CanonicalRecord {
        id: next_record_id(),
        question: item.question.clone(),
        question_kind: ContentKind::Text,
        question_image: None,
        correct_answer: Some(correct_answer),
        category: String::new(),
        options: item.options.iter().map(OptionEntry::text).collect(),
    }
}

/// 合并题目列表
///
/// 已有列表恰好是一道空白题目时直接替换，否则追加
pub fn merge(
    existing: Vec<CanonicalRecord>,
    incoming: Vec<CanonicalRecord>,
) -> Vec<CanonicalRecord> {
    if existing.len() == 1 && existing[0].is_blank() {
        return incoming;
    }

    let mut merged = existing;
    merged.extend(incoming);
    merged
}

use serde::{Deserialize, Serialize};

use super::generation::RawItem;

/// 题干 / 选项的展示形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub text: String,
    #[serde(default)]
    pub kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl OptionEntry {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ContentKind::Text,
            image: None,
        }
    }
}

/// 统一的题目记录，与导入来源（AI、表格、题库）无关
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub question_kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_image: Option<String>,
    /// 正确选项下标，未选择时为 None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<usize>,
    #[serde(default)]
    pub category: String,
    // TOML 中表数组必须放在普通字段之后
    #[serde(default)]
    pub options: Vec<OptionEntry>,
}

impl CanonicalRecord {
    /// 出题表单初始状态下的空白题目
    pub fn blank(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: String::new(),
            question_kind: ContentKind::Text,
            question_image: None,
            correct_answer: None,
            category: String::new(),
            options: (0..4).map(|_| OptionEntry::text("")).collect(),
        }
    }

    /// 空白题目：没有题干、没有图片、没有选定答案
    pub fn is_blank(&self) -> bool {
        self.question.trim().is_empty()
            && self.question_image.is_none()
            && self.correct_answer.is_none()
    }
}

/// 试卷草稿，保存到 TOML 文件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExamDraft {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub questions: Vec<CanonicalRecord>,
}

/// 题库文件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBank {
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub questions: Vec<RawItem>,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<String>,
}

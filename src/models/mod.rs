pub mod generation;
pub mod job;
pub mod loaders;
pub mod question;

pub use generation::{ApiEnvelope, GenerationRequest, RawItem, ReferenceKey};
pub use job::{Job, JobStatus, PollSettings, ProgressEstimate};
pub use loaders::{load_all_question_banks, load_exam_draft, load_question_bank, save_exam_draft};
pub use question::{CanonicalRecord, ContentKind, ExamDraft, OptionEntry, QuestionBank};

use serde::Serialize;

use crate::question::format_time_ago;

#[derive(Debug, Clone)]
pub struct Answer {
    pub id: u64,
    pub question_id: u64,
    pub author_id: u64,
    pub content: String,
    pub is_accepted: bool,
    pub created_at: i64,
}

/// An answer row joined with its author name and net vote score,
/// already sorted by (accepted first, score, creation time).
#[derive(Debug, Clone)]
pub struct AnswerSummary {
    pub id: u64,
    pub content: String,
    pub author: String,
    pub score: i64,
    pub is_accepted: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerView {
    pub id: u64,
    pub content: String,
    pub author: String,
    pub score: i64,
    #[serde(rename = "isAccepted")]
    pub is_accepted: bool,
    pub time: String,
}

impl AnswerView {
    pub fn new(summary: AnswerSummary, now: i64) -> Self {
        Self {
            id: summary.id,
            content: summary.content,
            author: summary.author,
            score: summary.score,
            is_accepted: summary.is_accepted,
            time: format_time_ago(summary.created_at, now),
        }
    }
}

use serde::Serialize;

use crate::answer::AnswerView;
use crate::Error;

#[derive(Debug, Clone)]
pub struct Question {
    pub id: u64,
    pub author_id: u64,
    pub title: String,
    pub description: String,
    pub created_at: i64,
}

/// A question row joined with its author name and net vote score, as
/// produced by the listing query. Tags and answers are fetched
/// separately.
#[derive(Debug, Clone)]
pub struct QuestionSummary {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub author: String,
    pub score: i64,
    pub created_at: i64,
}

/// The wire shape of a question: tags de-duplicated, score summed from
/// vote rows, and a relative age string computed at response time.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub author: String,
    pub tags: Vec<String>,
    pub score: i64,
    pub time: String,
    pub answers: Vec<AnswerView>,
}

impl QuestionView {
    pub fn new(summary: QuestionSummary, tags: Vec<String>, answers: Vec<AnswerView>, now: i64) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            description: summary.description,
            author: summary.author,
            tags,
            score: summary.score,
            time: format_time_ago(summary.created_at, now),
            answers,
        }
    }
}

/// The enumerated listing filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    TopVoted,
    Newest,
    Unanswered,
}

impl ListFilter {
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "topvoted" => Ok(ListFilter::TopVoted),
            "newest" => Ok(ListFilter::Newest),
            "unanswered" => Ok(ListFilter::Unanswered),
            other => Err(Error::Validation(format!(
                "filter must be one of topvoted, newest, unanswered, got \"{}\"",
                other
            ))),
        }
    }
}

/// "N days/hours/minutes ago" or "Just now", from unix seconds.
pub fn format_time_ago(created_at: i64, now: i64) -> String {
    let diff = (now - created_at).max(0);
    let days = diff / (60 * 60 * 24);
    let hours = diff / (60 * 60);
    let minutes = diff / 60;

    if days > 0 {
        format!("{} day{} ago", days, if days > 1 { "s" } else { "" })
    } else if hours > 0 {
        format!("{} hour{} ago", hours, if hours > 1 { "s" } else { "" })
    } else if minutes > 0 {
        format!("{} minute{} ago", minutes, if minutes > 1 { "s" } else { "" })
    } else {
        "Just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_ago_buckets() {
        let now = 1_700_000_000;
        assert_eq!(format_time_ago(now, now), "Just now");
        assert_eq!(format_time_ago(now - 59, now), "Just now");
        assert_eq!(format_time_ago(now - 60, now), "1 minute ago");
        assert_eq!(format_time_ago(now - 5 * 60, now), "5 minutes ago");
        assert_eq!(format_time_ago(now - 60 * 60, now), "1 hour ago");
        assert_eq!(format_time_ago(now - 3 * 60 * 60, now), "3 hours ago");
        assert_eq!(format_time_ago(now - 24 * 60 * 60, now), "1 day ago");
        assert_eq!(format_time_ago(now - 72 * 60 * 60, now), "3 days ago");
    }

    #[test]
    fn time_ago_never_negative() {
        let now = 1_700_000_000;
        assert_eq!(format_time_ago(now + 100, now), "Just now");
    }

    #[test]
    fn filter_parsing() {
        assert_eq!(ListFilter::parse("topvoted").unwrap(), ListFilter::TopVoted);
        assert_eq!(ListFilter::parse("newest").unwrap(), ListFilter::Newest);
        assert_eq!(ListFilter::parse("unanswered").unwrap(), ListFilter::Unanswered);
        assert!(ListFilter::parse("oldest").is_err());
    }
}

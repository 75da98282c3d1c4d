use async_trait::async_trait;

use crate::answer::{Answer, AnswerSummary};
use crate::notification::Notification;
use crate::question::{ListFilter, Question, QuestionSummary};
use crate::tag::Tag;
use crate::user::{Session, User};
use crate::vote::{VoteOutcome, VoteTarget};

/// Storage operations behind the `Forum` facade. Backed either by
/// MySQL (`DbStore`) or by in-memory maps for tests (`MemStore`).
///
/// Multi-statement rules (`apply_vote`, `set_accepted_answer`,
/// `delete_question`, `delete_answer`) must be atomic in each backend.
#[async_trait]
pub trait ForumStore {
    // users
    async fn insert_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
        created_at: i64,
    ) -> anyhow::Result<u64>;
    async fn user_by_id(&self, id: u64) -> anyhow::Result<Option<User>>;
    async fn user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    // sessions
    async fn insert_session(&self, session: &Session) -> anyhow::Result<()>;
    async fn session_by_token(&self, token: &str) -> anyhow::Result<Option<Session>>;
    async fn delete_session(&self, token: &str) -> anyhow::Result<()>;

    // questions
    async fn insert_question(
        &self,
        author_id: u64,
        title: &str,
        description: &str,
        created_at: i64,
    ) -> anyhow::Result<u64>;
    async fn question_by_id(&self, id: u64) -> anyhow::Result<Option<Question>>;
    async fn question_summary(&self, id: u64) -> anyhow::Result<Option<QuestionSummary>>;
    async fn update_question(&self, id: u64, title: &str, description: &str) -> anyhow::Result<()>;
    /// Removes the question, its answers, join rows, and every vote on
    /// the question or its answers.
    async fn delete_question(&self, id: u64) -> anyhow::Result<()>;
    async fn list_questions(
        &self,
        filter: ListFilter,
        tags: &[String],
        limit: u32,
        offset: u32,
    ) -> anyhow::Result<Vec<QuestionSummary>>;

    // answers
    async fn insert_answer(
        &self,
        question_id: u64,
        author_id: u64,
        content: &str,
        created_at: i64,
    ) -> anyhow::Result<u64>;
    async fn answer_by_id(&self, id: u64) -> anyhow::Result<Option<Answer>>;
    async fn update_answer(&self, id: u64, content: &str) -> anyhow::Result<()>;
    async fn delete_answer(&self, id: u64) -> anyhow::Result<()>;
    async fn answers_for_question(&self, question_id: u64) -> anyhow::Result<Vec<AnswerSummary>>;
    /// Exclusive choice: clears is_accepted on every answer of the
    /// question, then sets it on the given answer, atomically.
    async fn set_accepted_answer(&self, question_id: u64, answer_id: u64) -> anyhow::Result<()>;

    // tags
    /// Get-or-create by name, case-sensitive. Never produces duplicate
    /// rows for the same name.
    async fn ensure_tag(&self, name: &str) -> anyhow::Result<u64>;
    async fn link_tag(&self, question_id: u64, tag_id: u64) -> anyhow::Result<()>;
    async fn tags_for_question(&self, question_id: u64) -> anyhow::Result<Vec<String>>;
    async fn all_tags(&self) -> anyhow::Result<Vec<Tag>>;
    async fn tag_by_id(&self, id: u64) -> anyhow::Result<Option<Tag>>;

    // votes
    /// Applies the vote toggle rule for (voter, target) and returns the
    /// resulting vote state plus the recomputed aggregate score, all
    /// within a single transaction.
    async fn apply_vote(
        &self,
        voter_id: u64,
        target: VoteTarget,
        requested: i8,
        created_at: i64,
    ) -> anyhow::Result<VoteOutcome>;

    // notifications
    async fn insert_notification(
        &self,
        recipient_id: u64,
        kind: &str,
        content: &str,
        created_at: i64,
    ) -> anyhow::Result<u64>;
    async fn notifications_for_user(&self, user_id: u64) -> anyhow::Result<Vec<Notification>>;
    /// Returns false when the notification does not exist or belongs to
    /// someone else.
    async fn mark_notification_read(&self, user_id: u64, id: u64) -> anyhow::Result<bool>;
}

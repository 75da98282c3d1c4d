use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::answer::{Answer, AnswerSummary};
use crate::forum::Forum;
use crate::notification::Notification;
use crate::question::{ListFilter, Question, QuestionSummary};
use crate::store::ForumStore;
use crate::tag::Tag;
use crate::user::{Session, User};
use crate::vote::{self, Transition, Vote, VoteOutcome, VoteTarget};

#[derive(Default)]
struct Inner {
    next_user_id: u64,
    next_question_id: u64,
    next_answer_id: u64,
    next_tag_id: u64,
    next_vote_id: u64,
    next_notification_id: u64,
    users: HashMap<u64, User>,
    sessions: HashMap<String, Session>,
    questions: HashMap<u64, Question>,
    answers: HashMap<u64, Answer>,
    tags: HashMap<u64, Tag>,
    question_tags: HashSet<(u64, u64)>,
    votes: HashMap<u64, Vote>,
    notifications: HashMap<u64, Notification>,
}

impl Inner {
    fn score_for(&self, target: VoteTarget) -> i64 {
        self.votes
            .values()
            .filter(|v| v.target == target)
            .map(|v| v.value as i64)
            .sum()
    }

    fn username(&self, user_id: u64) -> String {
        self.users
            .get(&user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn tag_names(&self, question_id: u64) -> Vec<String> {
        let mut names: Vec<String> = self
            .question_tags
            .iter()
            .filter(|(qid, _)| *qid == question_id)
            .filter_map(|(_, tid)| self.tags.get(tid).map(|t| t.name.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn answer_count(&self, question_id: u64) -> usize {
        self.answers
            .values()
            .filter(|a| a.question_id == question_id)
            .count()
    }

    fn summarize(&self, q: &Question) -> QuestionSummary {
        QuestionSummary {
            id: q.id,
            title: q.title.clone(),
            description: q.description.clone(),
            author: self.username(q.author_id),
            score: self.score_for(VoteTarget::Question(q.id)),
            created_at: q.created_at,
        }
    }
}

pub struct MemStore {
    inner: RwLock<Inner>,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Inner::default()),
        })
    }
}

impl std::fmt::Debug for MemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_read() {
            Ok(read) => write!(
                f,
                "MemStore(users: {}, questions: {}, answers: {}, tags: {}, votes: {})",
                read.users.len(),
                read.questions.len(),
                read.answers.len(),
                read.tags.len(),
                read.votes.len(),
            ),
            Err(_) => write!(f, "MemStore: <locked>"),
        }
    }
}

#[async_trait]
impl ForumStore for MemStore {
    async fn insert_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
        created_at: i64,
    ) -> anyhow::Result<u64> {
        let mut write = self.inner.write().await;
        write.next_user_id += 1;
        let id = write.next_user_id;
        write.users.insert(
            id,
            User {
                id,
                username: username.to_string(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                role: role.to_string(),
                created_at,
            },
        );
        Ok(id)
    }

    async fn user_by_id(&self, id: u64) -> anyhow::Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let read = self.inner.read().await;
        Ok(read.users.values().find(|u| u.username == username).cloned())
    }

    async fn user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let read = self.inner.read().await;
        Ok(read.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_session(&self, session: &Session) -> anyhow::Result<()> {
        let mut write = self.inner.write().await;
        write.sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> anyhow::Result<Option<Session>> {
        Ok(self.inner.read().await.sessions.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> anyhow::Result<()> {
        self.inner.write().await.sessions.remove(token);
        Ok(())
    }

    async fn insert_question(
        &self,
        author_id: u64,
        title: &str,
        description: &str,
        created_at: i64,
    ) -> anyhow::Result<u64> {
        let mut write = self.inner.write().await;
        write.next_question_id += 1;
        let id = write.next_question_id;
        write.questions.insert(
            id,
            Question {
                id,
                author_id,
                title: title.to_string(),
                description: description.to_string(),
                created_at,
            },
        );
        Ok(id)
    }

    async fn question_by_id(&self, id: u64) -> anyhow::Result<Option<Question>> {
        Ok(self.inner.read().await.questions.get(&id).cloned())
    }

    async fn question_summary(&self, id: u64) -> anyhow::Result<Option<QuestionSummary>> {
        let read = self.inner.read().await;
        Ok(read.questions.get(&id).map(|q| read.summarize(q)))
    }

    async fn update_question(&self, id: u64, title: &str, description: &str) -> anyhow::Result<()> {
        let mut write = self.inner.write().await;
        if let Some(q) = write.questions.get_mut(&id) {
            q.title = title.to_string();
            q.description = description.to_string();
        }
        Ok(())
    }

    async fn delete_question(&self, id: u64) -> anyhow::Result<()> {
        let mut write = self.inner.write().await;
        let answer_ids: HashSet<u64> = write
            .answers
            .values()
            .filter(|a| a.question_id == id)
            .map(|a| a.id)
            .collect();
        write.votes.retain(|_, v| match v.target {
            VoteTarget::Question(qid) => qid != id,
            VoteTarget::Answer(aid) => !answer_ids.contains(&aid),
        });
        write.answers.retain(|_, a| a.question_id != id);
        write.question_tags.retain(|(qid, _)| *qid != id);
        write.questions.remove(&id);
        Ok(())
    }

    async fn list_questions(
        &self,
        filter: ListFilter,
        tags: &[String],
        limit: u32,
        offset: u32,
    ) -> anyhow::Result<Vec<QuestionSummary>> {
        let read = self.inner.read().await;
        let mut rows: Vec<QuestionSummary> = read
            .questions
            .values()
            .filter(|q| {
                // match-any tag semantics
                tags.is_empty() || read.tag_names(q.id).iter().any(|t| tags.contains(t))
            })
            .filter(|q| filter != ListFilter::Unanswered || read.answer_count(q.id) == 0)
            .map(|q| read.summarize(q))
            .collect();

        match filter {
            ListFilter::TopVoted => rows.sort_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then(b.created_at.cmp(&a.created_at))
                    .then(b.id.cmp(&a.id))
            }),
            ListFilter::Newest | ListFilter::Unanswered => {
                rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
            }
        }

        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn insert_answer(
        &self,
        question_id: u64,
        author_id: u64,
        content: &str,
        created_at: i64,
    ) -> anyhow::Result<u64> {
        let mut write = self.inner.write().await;
        write.next_answer_id += 1;
        let id = write.next_answer_id;
        write.answers.insert(
            id,
            Answer {
                id,
                question_id,
                author_id,
                content: content.to_string(),
                is_accepted: false,
                created_at,
            },
        );
        Ok(id)
    }

    async fn answer_by_id(&self, id: u64) -> anyhow::Result<Option<Answer>> {
        Ok(self.inner.read().await.answers.get(&id).cloned())
    }

    async fn update_answer(&self, id: u64, content: &str) -> anyhow::Result<()> {
        let mut write = self.inner.write().await;
        if let Some(a) = write.answers.get_mut(&id) {
            a.content = content.to_string();
        }
        Ok(())
    }

    async fn delete_answer(&self, id: u64) -> anyhow::Result<()> {
        let mut write = self.inner.write().await;
        write
            .votes
            .retain(|_, v| v.target != VoteTarget::Answer(id));
        write.answers.remove(&id);
        Ok(())
    }

    async fn answers_for_question(&self, question_id: u64) -> anyhow::Result<Vec<AnswerSummary>> {
        let read = self.inner.read().await;
        let mut rows: Vec<AnswerSummary> = read
            .answers
            .values()
            .filter(|a| a.question_id == question_id)
            .map(|a| AnswerSummary {
                id: a.id,
                content: a.content.clone(),
                author: read.username(a.author_id),
                score: read.score_for(VoteTarget::Answer(a.id)),
                is_accepted: a.is_accepted,
                created_at: a.created_at,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.is_accepted
                .cmp(&a.is_accepted)
                .then(b.score.cmp(&a.score))
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(rows)
    }

    async fn set_accepted_answer(&self, question_id: u64, answer_id: u64) -> anyhow::Result<()> {
        let mut write = self.inner.write().await;
        for a in write.answers.values_mut() {
            if a.question_id == question_id {
                a.is_accepted = a.id == answer_id;
            }
        }
        Ok(())
    }

    async fn ensure_tag(&self, name: &str) -> anyhow::Result<u64> {
        let mut write = self.inner.write().await;
        if let Some(tag) = write.tags.values().find(|t| t.name == name) {
            return Ok(tag.id);
        }
        write.next_tag_id += 1;
        let id = write.next_tag_id;
        write.tags.insert(
            id,
            Tag {
                id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    async fn link_tag(&self, question_id: u64, tag_id: u64) -> anyhow::Result<()> {
        self.inner.write().await.question_tags.insert((question_id, tag_id));
        Ok(())
    }

    async fn tags_for_question(&self, question_id: u64) -> anyhow::Result<Vec<String>> {
        Ok(self.inner.read().await.tag_names(question_id))
    }

    async fn all_tags(&self) -> anyhow::Result<Vec<Tag>> {
        let read = self.inner.read().await;
        let mut tags: Vec<Tag> = read.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn tag_by_id(&self, id: u64) -> anyhow::Result<Option<Tag>> {
        Ok(self.inner.read().await.tags.get(&id).cloned())
    }

    async fn apply_vote(
        &self,
        voter_id: u64,
        target: VoteTarget,
        requested: i8,
        created_at: i64,
    ) -> anyhow::Result<VoteOutcome> {
        let mut write = self.inner.write().await;
        let existing = write
            .votes
            .values()
            .find(|v| v.voter_id == voter_id && v.target == target)
            .map(|v| (v.id, v.value));

        let vote = match vote::transition(existing.map(|(_, v)| v), requested) {
            Transition::Create(value) => {
                write.next_vote_id += 1;
                let id = write.next_vote_id;
                write.votes.insert(
                    id,
                    Vote {
                        id,
                        voter_id,
                        target,
                        value,
                        created_at,
                    },
                );
                Some(value)
            }
            Transition::Remove => {
                let (id, _) = existing.expect("transition requires an existing vote");
                write.votes.remove(&id);
                None
            }
            Transition::Flip(value) => {
                let (id, _) = existing.expect("transition requires an existing vote");
                if let Some(v) = write.votes.get_mut(&id) {
                    v.value = value;
                }
                Some(value)
            }
        };

        Ok(VoteOutcome {
            vote,
            votes: write.score_for(target),
        })
    }

    async fn insert_notification(
        &self,
        recipient_id: u64,
        kind: &str,
        content: &str,
        created_at: i64,
    ) -> anyhow::Result<u64> {
        let mut write = self.inner.write().await;
        write.next_notification_id += 1;
        let id = write.next_notification_id;
        write.notifications.insert(
            id,
            Notification {
                id,
                recipient_id,
                kind: kind.to_string(),
                content: content.to_string(),
                is_read: false,
                created_at,
            },
        );
        Ok(id)
    }

    async fn notifications_for_user(&self, user_id: u64) -> anyhow::Result<Vec<Notification>> {
        let read = self.inner.read().await;
        let mut rows: Vec<Notification> = read
            .notifications
            .values()
            .filter(|n| n.recipient_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn mark_notification_read(&self, user_id: u64, id: u64) -> anyhow::Result<bool> {
        let mut write = self.inner.write().await;
        match write.notifications.get_mut(&id) {
            Some(n) if n.recipient_id == user_id => {
                n.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl Forum {
    pub fn new_in_memory() -> Self {
        Self::new(MemStore::new())
    }
}

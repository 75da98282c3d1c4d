use std::{env, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use mysql_async::{prelude::*, Params, Pool, Row, TxOpts, Value};
use url::Url;

use crate::answer::{Answer, AnswerSummary};
use crate::forum::Forum;
use crate::notification::Notification;
use crate::question::{ListFilter, Question, QuestionSummary};
use crate::store::ForumStore;
use crate::tag::Tag;
use crate::user::{Session, User};
use crate::vote::{self, Transition, VoteOutcome, VoteTarget};

const USER: &str = "root";
const PASSWORD: Option<&str> = None;
const HOST: &str = "localhost";
const PORT: u16 = 3306;

pub struct DbStore {
    pool: Pool,
}

impl DbStore {
    fn new(schema_name: impl AsRef<str>) -> anyhow::Result<Arc<Self>> {
        Ok(Arc::new(Self {
            pool: db_pool(schema_name.as_ref())?,
        }))
    }
}

impl Forum {
    pub async fn new_db(schema_name: impl AsRef<str>) -> anyhow::Result<Self> {
        let store = DbStore::new(schema_name)?;
        store.pool.get_conn().await?.ping().await?;
        Ok(Self::new(store))
    }
}

fn row_to_user(row: &Row) -> anyhow::Result<User> {
    Ok(User {
        id: row.get("id").ok_or_else(|| anyhow!("user id not found"))?,
        username: row
            .get("username")
            .ok_or_else(|| anyhow!("username not found"))?,
        email: row.get("email").ok_or_else(|| anyhow!("email not found"))?,
        password_hash: row
            .get("password_hash")
            .ok_or_else(|| anyhow!("password hash not found"))?,
        role: row.get("role").ok_or_else(|| anyhow!("role not found"))?,
        created_at: row
            .get("created_at")
            .ok_or_else(|| anyhow!("created_at not found"))?,
    })
}

fn row_to_question(row: &Row) -> anyhow::Result<Question> {
    Ok(Question {
        id: row.get("id").ok_or_else(|| anyhow!("question id not found"))?,
        author_id: row
            .get("user_id")
            .ok_or_else(|| anyhow!("question user_id not found"))?,
        title: row.get("title").ok_or_else(|| anyhow!("title not found"))?,
        description: row
            .get("description")
            .ok_or_else(|| anyhow!("description not found"))?,
        created_at: row
            .get("created_at")
            .ok_or_else(|| anyhow!("created_at not found"))?,
    })
}

fn row_to_question_summary(row: &Row) -> anyhow::Result<QuestionSummary> {
    Ok(QuestionSummary {
        id: row.get("id").ok_or_else(|| anyhow!("question id not found"))?,
        title: row.get("title").ok_or_else(|| anyhow!("title not found"))?,
        description: row
            .get("description")
            .ok_or_else(|| anyhow!("description not found"))?,
        author: row
            .get("username")
            .ok_or_else(|| anyhow!("username not found"))?,
        score: row.get("score").ok_or_else(|| anyhow!("score not found"))?,
        created_at: row
            .get("created_at")
            .ok_or_else(|| anyhow!("created_at not found"))?,
    })
}

#[async_trait]
impl ForumStore for DbStore {
    async fn insert_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
        created_at: i64,
    ) -> anyhow::Result<u64> {
        let mut conn = self.pool.get_conn().await?;
        let query = r"INSERT INTO users (username, email, password_hash, role, created_at)
            VALUES (:username, :email, :password_hash, :role, :created_at)";
        let params = params! {
            "username" => username,
            "email" => email,
            "password_hash" => password_hash,
            "role" => role,
            "created_at" => created_at,
        };
        conn.exec_drop(query, params).await?;
        conn.last_insert_id()
            .ok_or_else(|| anyhow!("no id for inserted user"))
    }

    async fn user_by_id(&self, id: u64) -> anyhow::Result<Option<User>> {
        let mut conn = self.pool.get_conn().await?;
        let query = "SELECT id, username, email, password_hash, role, created_at FROM users WHERE id = :id";
        let result: Option<Row> = conn.exec_first(query, params! { "id" => id }).await?;
        result.as_ref().map(row_to_user).transpose()
    }

    async fn user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let mut conn = self.pool.get_conn().await?;
        let query = "SELECT id, username, email, password_hash, role, created_at FROM users WHERE username = :username";
        let result: Option<Row> = conn
            .exec_first(query, params! { "username" => username })
            .await?;
        result.as_ref().map(row_to_user).transpose()
    }

    async fn user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let mut conn = self.pool.get_conn().await?;
        let query = "SELECT id, username, email, password_hash, role, created_at FROM users WHERE email = :email";
        let result: Option<Row> = conn.exec_first(query, params! { "email" => email }).await?;
        result.as_ref().map(row_to_user).transpose()
    }

    async fn insert_session(&self, session: &Session) -> anyhow::Result<()> {
        let mut conn = self.pool.get_conn().await?;
        let query = r"INSERT INTO sessions (token, user_id, expires_at, created_at)
            VALUES (:token, :user_id, :expires_at, :created_at)";
        let params = params! {
            "token" => &session.token,
            "user_id" => session.user_id,
            "expires_at" => session.expires_at,
            "created_at" => session.created_at,
        };
        conn.exec_drop(query, params).await?;
        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let mut conn = self.pool.get_conn().await?;
        let query = "SELECT token, user_id, expires_at, created_at FROM sessions WHERE token = :token";
        let result: Option<Row> = conn.exec_first(query, params! { "token" => token }).await?;
        match result {
            Some(row) => Ok(Some(Session {
                token: row.get("token").ok_or_else(|| anyhow!("token not found"))?,
                user_id: row
                    .get("user_id")
                    .ok_or_else(|| anyhow!("session user_id not found"))?,
                expires_at: row
                    .get("expires_at")
                    .ok_or_else(|| anyhow!("expires_at not found"))?,
                created_at: row
                    .get("created_at")
                    .ok_or_else(|| anyhow!("created_at not found"))?,
            })),
            None => Ok(None),
        }
    }

    async fn delete_session(&self, token: &str) -> anyhow::Result<()> {
        let mut conn = self.pool.get_conn().await?;
        conn.exec_drop(
            "DELETE FROM sessions WHERE token = :token",
            params! { "token" => token },
        )
        .await?;
        Ok(())
    }

    async fn insert_question(
        &self,
        author_id: u64,
        title: &str,
        description: &str,
        created_at: i64,
    ) -> anyhow::Result<u64> {
        let mut conn = self.pool.get_conn().await?;
        let query = r"INSERT INTO questions (user_id, title, description, created_at)
            VALUES (:user_id, :title, :description, :created_at)";
        let params = params! {
            "user_id" => author_id,
            "title" => title,
            "description" => description,
            "created_at" => created_at,
        };
        conn.exec_drop(query, params).await?;
        conn.last_insert_id()
            .ok_or_else(|| anyhow!("no id for inserted question"))
    }

    async fn question_by_id(&self, id: u64) -> anyhow::Result<Option<Question>> {
        let mut conn = self.pool.get_conn().await?;
        let query = "SELECT id, user_id, title, description, created_at FROM questions WHERE id = :id";
        let result: Option<Row> = conn.exec_first(query, params! { "id" => id }).await?;
        result.as_ref().map(row_to_question).transpose()
    }

    async fn question_summary(&self, id: u64) -> anyhow::Result<Option<QuestionSummary>> {
        let mut conn = self.pool.get_conn().await?;
        let query = r"
            SELECT q.id, q.title, q.description, q.created_at, u.username,
                   CAST(COALESCE(s.score, 0) AS SIGNED) AS score
            FROM questions q
            JOIN users u ON q.user_id = u.id
            LEFT JOIN (
                SELECT target_id, SUM(value) AS score FROM votes
                WHERE target_kind = 'question' GROUP BY target_id
            ) s ON s.target_id = q.id
            WHERE q.id = :id";
        let result: Option<Row> = conn.exec_first(query, params! { "id" => id }).await?;
        result.as_ref().map(row_to_question_summary).transpose()
    }

    async fn update_question(&self, id: u64, title: &str, description: &str) -> anyhow::Result<()> {
        let mut conn = self.pool.get_conn().await?;
        let query = "UPDATE questions SET title = :title, description = :description WHERE id = :id";
        conn.exec_drop(
            query,
            params! { "title" => title, "description" => description, "id" => id },
        )
        .await?;
        Ok(())
    }

    async fn delete_question(&self, id: u64) -> anyhow::Result<()> {
        let mut conn = self.pool.get_conn().await?;
        let mut tx = conn.start_transaction(TxOpts::default()).await?;
        // Votes reference their target by kind and id, so the foreign
        // key cascade on answers does not reach them.
        tx.exec_drop(
            r"DELETE FROM votes WHERE target_kind = 'answer'
                AND target_id IN (SELECT id FROM answers WHERE question_id = :id)",
            params! { "id" => id },
        )
        .await?;
        tx.exec_drop(
            "DELETE FROM votes WHERE target_kind = 'question' AND target_id = :id",
            params! { "id" => id },
        )
        .await?;
        tx.exec_drop("DELETE FROM questions WHERE id = :id", params! { "id" => id })
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_questions(
        &self,
        filter: ListFilter,
        tags: &[String],
        limit: u32,
        offset: u32,
    ) -> anyhow::Result<Vec<QuestionSummary>> {
        let mut conn = self.pool.get_conn().await?;

        let mut query = String::from(
            r"
            SELECT q.id, q.title, q.description, q.created_at, u.username,
                   CAST(COALESCE(s.score, 0) AS SIGNED) AS score
            FROM questions q
            JOIN users u ON q.user_id = u.id
            LEFT JOIN (
                SELECT target_id, SUM(value) AS score FROM votes
                WHERE target_kind = 'question' GROUP BY target_id
            ) s ON s.target_id = q.id",
        );
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if !tags.is_empty() {
            // match-any: the question carries at least one requested tag
            let placeholders = vec!["?"; tags.len()].join(", ");
            clauses.push(format!(
                r"EXISTS (
                    SELECT 1 FROM question_tags qt
                    JOIN tags t ON qt.tag_id = t.id
                    WHERE qt.question_id = q.id AND t.name IN ({})
                )",
                placeholders
            ));
            values.extend(tags.iter().map(|t| Value::from(t.as_str())));
        }
        if filter == ListFilter::Unanswered {
            clauses.push("NOT EXISTS (SELECT 1 FROM answers a WHERE a.question_id = q.id)".to_string());
        }
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }

        query.push_str(match filter {
            ListFilter::TopVoted => " ORDER BY score DESC, q.created_at DESC, q.id DESC",
            ListFilter::Newest | ListFilter::Unanswered => " ORDER BY q.created_at DESC, q.id DESC",
        });
        query.push_str(" LIMIT ? OFFSET ?");
        values.push(Value::from(limit));
        values.push(Value::from(offset));

        let rows: Vec<Row> = conn.exec(query, Params::Positional(values)).await?;
        rows.iter().map(row_to_question_summary).collect()
    }

    async fn insert_answer(
        &self,
        question_id: u64,
        author_id: u64,
        content: &str,
        created_at: i64,
    ) -> anyhow::Result<u64> {
        let mut conn = self.pool.get_conn().await?;
        let query = r"INSERT INTO answers (question_id, user_id, content, created_at)
            VALUES (:question_id, :user_id, :content, :created_at)";
        let params = params! {
            "question_id" => question_id,
            "user_id" => author_id,
            "content" => content,
            "created_at" => created_at,
        };
        conn.exec_drop(query, params).await?;
        conn.last_insert_id()
            .ok_or_else(|| anyhow!("no id for inserted answer"))
    }

    async fn answer_by_id(&self, id: u64) -> anyhow::Result<Option<Answer>> {
        let mut conn = self.pool.get_conn().await?;
        let query = "SELECT id, question_id, user_id, content, is_accepted, created_at FROM answers WHERE id = :id";
        let result: Option<Row> = conn.exec_first(query, params! { "id" => id }).await?;
        match result {
            Some(row) => Ok(Some(Answer {
                id: row.get("id").ok_or_else(|| anyhow!("answer id not found"))?,
                question_id: row
                    .get("question_id")
                    .ok_or_else(|| anyhow!("question_id not found"))?,
                author_id: row
                    .get("user_id")
                    .ok_or_else(|| anyhow!("answer user_id not found"))?,
                content: row
                    .get("content")
                    .ok_or_else(|| anyhow!("content not found"))?,
                is_accepted: row
                    .get("is_accepted")
                    .ok_or_else(|| anyhow!("is_accepted not found"))?,
                created_at: row
                    .get("created_at")
                    .ok_or_else(|| anyhow!("created_at not found"))?,
            })),
            None => Ok(None),
        }
    }

    async fn update_answer(&self, id: u64, content: &str) -> anyhow::Result<()> {
        let mut conn = self.pool.get_conn().await?;
        conn.exec_drop(
            "UPDATE answers SET content = :content WHERE id = :id",
            params! { "content" => content, "id" => id },
        )
        .await?;
        Ok(())
    }

    async fn delete_answer(&self, id: u64) -> anyhow::Result<()> {
        let mut conn = self.pool.get_conn().await?;
        let mut tx = conn.start_transaction(TxOpts::default()).await?;
        tx.exec_drop(
            "DELETE FROM votes WHERE target_kind = 'answer' AND target_id = :id",
            params! { "id" => id },
        )
        .await?;
        tx.exec_drop("DELETE FROM answers WHERE id = :id", params! { "id" => id })
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn answers_for_question(&self, question_id: u64) -> anyhow::Result<Vec<AnswerSummary>> {
        let mut conn = self.pool.get_conn().await?;
        let query = r"
            SELECT a.id, a.content, a.is_accepted, a.created_at, u.username,
                   CAST(COALESCE(s.score, 0) AS SIGNED) AS score
            FROM answers a
            JOIN users u ON a.user_id = u.id
            LEFT JOIN (
                SELECT target_id, SUM(value) AS score FROM votes
                WHERE target_kind = 'answer' GROUP BY target_id
            ) s ON s.target_id = a.id
            WHERE a.question_id = :question_id
            ORDER BY a.is_accepted DESC, score DESC, a.created_at ASC, a.id ASC";
        let rows: Vec<Row> = conn
            .exec(query, params! { "question_id" => question_id })
            .await?;
        rows.iter()
            .map(|row| {
                Ok(AnswerSummary {
                    id: row.get("id").ok_or_else(|| anyhow!("answer id not found"))?,
                    content: row
                        .get("content")
                        .ok_or_else(|| anyhow!("content not found"))?,
                    author: row
                        .get("username")
                        .ok_or_else(|| anyhow!("username not found"))?,
                    score: row.get("score").ok_or_else(|| anyhow!("score not found"))?,
                    is_accepted: row
                        .get("is_accepted")
                        .ok_or_else(|| anyhow!("is_accepted not found"))?,
                    created_at: row
                        .get("created_at")
                        .ok_or_else(|| anyhow!("created_at not found"))?,
                })
            })
            .collect()
    }

    async fn set_accepted_answer(&self, question_id: u64, answer_id: u64) -> anyhow::Result<()> {
        let mut conn = self.pool.get_conn().await?;
        let mut tx = conn.start_transaction(TxOpts::default()).await?;
        tx.exec_drop(
            "UPDATE answers SET is_accepted = FALSE WHERE question_id = :question_id",
            params! { "question_id" => question_id },
        )
        .await?;
        tx.exec_drop(
            "UPDATE answers SET is_accepted = TRUE WHERE id = :id AND question_id = :question_id",
            params! { "id" => answer_id, "question_id" => question_id },
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn ensure_tag(&self, name: &str) -> anyhow::Result<u64> {
        let mut conn = self.pool.get_conn().await?;
        conn.exec_drop(
            "INSERT IGNORE INTO tags (name) VALUES (:name)",
            params! { "name" => name },
        )
        .await?;
        let id: Option<u64> = conn
            .exec_first("SELECT id FROM tags WHERE name = :name", params! { "name" => name })
            .await?;
        id.ok_or_else(|| anyhow!("tag not found after insert"))
    }

    async fn link_tag(&self, question_id: u64, tag_id: u64) -> anyhow::Result<()> {
        let mut conn = self.pool.get_conn().await?;
        conn.exec_drop(
            r"INSERT IGNORE INTO question_tags (question_id, tag_id)
                VALUES (:question_id, :tag_id)",
            params! { "question_id" => question_id, "tag_id" => tag_id },
        )
        .await?;
        Ok(())
    }

    async fn tags_for_question(&self, question_id: u64) -> anyhow::Result<Vec<String>> {
        let mut conn = self.pool.get_conn().await?;
        let query = r"
            SELECT DISTINCT t.name FROM tags t
            JOIN question_tags qt ON qt.tag_id = t.id
            WHERE qt.question_id = :question_id
            ORDER BY t.name ASC";
        let names: Vec<String> = conn
            .exec(query, params! { "question_id" => question_id })
            .await?;
        Ok(names)
    }

    async fn all_tags(&self) -> anyhow::Result<Vec<Tag>> {
        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<Row> = conn
            .query("SELECT id, name FROM tags ORDER BY name ASC")
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Tag {
                    id: row.get("id").ok_or_else(|| anyhow!("tag id not found"))?,
                    name: row.get("name").ok_or_else(|| anyhow!("tag name not found"))?,
                })
            })
            .collect()
    }

    async fn tag_by_id(&self, id: u64) -> anyhow::Result<Option<Tag>> {
        let mut conn = self.pool.get_conn().await?;
        let result: Option<Row> = conn
            .exec_first("SELECT id, name FROM tags WHERE id = :id", params! { "id" => id })
            .await?;
        match result {
            Some(row) => Ok(Some(Tag {
                id: row.get("id").ok_or_else(|| anyhow!("tag id not found"))?,
                name: row.get("name").ok_or_else(|| anyhow!("tag name not found"))?,
            })),
            None => Ok(None),
        }
    }

    async fn apply_vote(
        &self,
        voter_id: u64,
        target: VoteTarget,
        requested: i8,
        created_at: i64,
    ) -> anyhow::Result<VoteOutcome> {
        let mut conn = self.pool.get_conn().await?;
        let mut tx = conn.start_transaction(TxOpts::default()).await?;

        let existing: Option<Row> = tx
            .exec_first(
                r"SELECT id, value FROM votes
                    WHERE user_id = :user_id AND target_kind = :kind AND target_id = :target_id
                    FOR UPDATE",
                params! {
                    "user_id" => voter_id,
                    "kind" => target.kind(),
                    "target_id" => target.id(),
                },
            )
            .await?;
        let existing = match existing {
            Some(row) => Some((
                row.get::<u64, _>("id")
                    .ok_or_else(|| anyhow!("vote id not found"))?,
                row.get::<i8, _>("value")
                    .ok_or_else(|| anyhow!("vote value not found"))?,
            )),
            None => None,
        };

        let vote = match vote::transition(existing.map(|(_, v)| v), requested) {
            Transition::Create(value) => {
                // The unique key on (user_id, target_kind, target_id) is
                // the safety net against concurrent double-inserts.
                tx.exec_drop(
                    r"INSERT INTO votes (user_id, target_kind, target_id, value, created_at)
                        VALUES (:user_id, :kind, :target_id, :value, :created_at)",
                    params! {
                        "user_id" => voter_id,
                        "kind" => target.kind(),
                        "target_id" => target.id(),
                        "value" => value,
                        "created_at" => created_at,
                    },
                )
                .await?;
                Some(value)
            }
            Transition::Remove => {
                let (id, _) = existing.ok_or_else(|| anyhow!("vote row vanished"))?;
                tx.exec_drop("DELETE FROM votes WHERE id = :id", params! { "id" => id })
                    .await?;
                None
            }
            Transition::Flip(value) => {
                let (id, _) = existing.ok_or_else(|| anyhow!("vote row vanished"))?;
                tx.exec_drop(
                    "UPDATE votes SET value = :value WHERE id = :id",
                    params! { "value" => value, "id" => id },
                )
                .await?;
                Some(value)
            }
        };

        let score: Option<i64> = tx
            .exec_first(
                r"SELECT CAST(COALESCE(SUM(value), 0) AS SIGNED) FROM votes
                    WHERE target_kind = :kind AND target_id = :target_id",
                params! { "kind" => target.kind(), "target_id" => target.id() },
            )
            .await?;
        tx.commit().await?;

        Ok(VoteOutcome {
            vote,
            votes: score.unwrap_or(0),
        })
    }

    async fn insert_notification(
        &self,
        recipient_id: u64,
        kind: &str,
        content: &str,
        created_at: i64,
    ) -> anyhow::Result<u64> {
        let mut conn = self.pool.get_conn().await?;
        let query = r"INSERT INTO notifications (recipient_id, type, content, created_at)
            VALUES (:recipient_id, :type, :content, :created_at)";
        let params = params! {
            "recipient_id" => recipient_id,
            "type" => kind,
            "content" => content,
            "created_at" => created_at,
        };
        conn.exec_drop(query, params).await?;
        conn.last_insert_id()
            .ok_or_else(|| anyhow!("no id for inserted notification"))
    }

    async fn notifications_for_user(&self, user_id: u64) -> anyhow::Result<Vec<Notification>> {
        let mut conn = self.pool.get_conn().await?;
        let query = r"
            SELECT id, recipient_id, type, content, is_read, created_at FROM notifications
            WHERE recipient_id = :recipient_id
            ORDER BY created_at DESC, id DESC";
        let rows: Vec<Row> = conn
            .exec(query, params! { "recipient_id" => user_id })
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Notification {
                    id: row.get("id").ok_or_else(|| anyhow!("notification id not found"))?,
                    recipient_id: row
                        .get("recipient_id")
                        .ok_or_else(|| anyhow!("recipient_id not found"))?,
                    kind: row.get("type").ok_or_else(|| anyhow!("type not found"))?,
                    content: row
                        .get("content")
                        .ok_or_else(|| anyhow!("content not found"))?,
                    is_read: row
                        .get("is_read")
                        .ok_or_else(|| anyhow!("is_read not found"))?,
                    created_at: row
                        .get("created_at")
                        .ok_or_else(|| anyhow!("created_at not found"))?,
                })
            })
            .collect()
    }

    async fn mark_notification_read(&self, user_id: u64, id: u64) -> anyhow::Result<bool> {
        let mut conn = self.pool.get_conn().await?;
        // affected_rows would report 0 for an already-read row, so check
        // existence separately
        let exists: Option<u64> = conn
            .exec_first(
                "SELECT id FROM notifications WHERE id = :id AND recipient_id = :recipient_id",
                params! { "id" => id, "recipient_id" => user_id },
            )
            .await?;
        if exists.is_none() {
            return Ok(false);
        }
        conn.exec_drop(
            "UPDATE notifications SET is_read = TRUE WHERE id = :id AND recipient_id = :recipient_id",
            params! { "id" => id, "recipient_id" => user_id },
        )
        .await?;
        Ok(true)
    }
}

/// Builds the server URL from `DB_HOST`/`DB_USER`/`DB_PASSWORD`, falling
/// back to the compiled-in defaults. Env values come from the outside, so
/// a malformed one is an error, not a panic.
pub fn server_url() -> anyhow::Result<Url> {
    let mut server_url = Url::parse("mysql://").unwrap();
    let host = match env::var("DB_HOST") {
        Ok(val) => String::from(val.trim_matches('"')),
        Err(_) => HOST.to_string(),
    };
    let user = env::var("DB_USER").unwrap_or_else(|_| USER.to_string());
    let password = env::var("DB_PASSWORD").ok();
    server_url
        .set_host(Some(&host))
        .map_err(|e| anyhow!("invalid DB_HOST {:?}: {}", host, e))?;
    server_url
        .set_username(&user)
        .map_err(|_| anyhow!("invalid DB_USER {:?}", user))?;
    server_url
        .set_password(password.as_deref().or(PASSWORD))
        .map_err(|_| anyhow!("invalid DB_PASSWORD"))?;
    server_url
        .set_port(Some(PORT))
        .map_err(|_| anyhow!("could not set database port {}", PORT))?;
    Ok(server_url)
}

pub fn database_url(schema_name: &str) -> anyhow::Result<Url> {
    let mut database_url = server_url()?;
    database_url.set_path(schema_name);
    Ok(database_url)
}

pub fn server_pool() -> anyhow::Result<Pool> {
    Ok(Pool::new(server_url()?.as_str()))
}

pub fn db_pool(schema_name: &str) -> anyhow::Result<Pool> {
    Ok(Pool::new(database_url(schema_name)?.as_str()))
}

pub async fn drop_db(server_pool: &Pool, schema_name: &str) -> anyhow::Result<()> {
    let query = format!("DROP DATABASE IF EXISTS {}", schema_name);
    server_pool.get_conn().await?.query_drop(query).await?;

    Ok(())
}

pub async fn create_db(server_pool: &Pool, schema_name: &str) -> anyhow::Result<()> {
    let query = format!("CREATE DATABASE IF NOT EXISTS {}", schema_name);
    server_pool.get_conn().await?.query_drop(query).await?;

    let query = format!(
        r"CREATE TABLE IF NOT EXISTS {}.users (
            id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
            username VARCHAR(100) NOT NULL UNIQUE,
            email VARCHAR(200) NOT NULL UNIQUE,
            password_hash VARCHAR(100) NOT NULL,
            role VARCHAR(20) NOT NULL DEFAULT 'user',
            created_at BIGINT NOT NULL
        )",
        schema_name
    );
    server_pool.get_conn().await?.query_drop(query).await?;

    let query = format!(
        r"CREATE TABLE IF NOT EXISTS {}.questions (
            id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
            user_id BIGINT UNSIGNED NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            created_at BIGINT NOT NULL,
            INDEX (user_id),
            INDEX (created_at),
            FOREIGN KEY (user_id) REFERENCES {}.users(id) ON DELETE CASCADE
        )",
        schema_name, schema_name
    );
    server_pool.get_conn().await?.query_drop(query).await?;

    let query = format!(
        r"CREATE TABLE IF NOT EXISTS {}.answers (
            id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
            question_id BIGINT UNSIGNED NOT NULL,
            user_id BIGINT UNSIGNED NOT NULL,
            content TEXT NOT NULL,
            is_accepted BOOLEAN NOT NULL DEFAULT FALSE,
            created_at BIGINT NOT NULL,
            INDEX (question_id),
            FOREIGN KEY (question_id) REFERENCES {}.questions(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES {}.users(id) ON DELETE CASCADE
        )",
        schema_name, schema_name, schema_name
    );
    server_pool.get_conn().await?.query_drop(query).await?;

    // utf8mb4_bin keeps tag names case-sensitive
    let query = format!(
        r"CREATE TABLE IF NOT EXISTS {}.tags (
            id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
            name VARCHAR(100) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL UNIQUE
        )",
        schema_name
    );
    server_pool.get_conn().await?.query_drop(query).await?;

    let query = format!(
        r"CREATE TABLE IF NOT EXISTS {}.question_tags (
            question_id BIGINT UNSIGNED NOT NULL,
            tag_id BIGINT UNSIGNED NOT NULL,
            PRIMARY KEY (question_id, tag_id),
            FOREIGN KEY (question_id) REFERENCES {}.questions(id) ON DELETE CASCADE,
            FOREIGN KEY (tag_id) REFERENCES {}.tags(id) ON DELETE CASCADE
        )",
        schema_name, schema_name, schema_name
    );
    server_pool.get_conn().await?.query_drop(query).await?;

    let query = format!(
        r"CREATE TABLE IF NOT EXISTS {}.votes (
            id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
            user_id BIGINT UNSIGNED NOT NULL,
            target_kind VARCHAR(8) NOT NULL,
            target_id BIGINT UNSIGNED NOT NULL,
            value TINYINT NOT NULL,
            created_at BIGINT NOT NULL,
            UNIQUE KEY one_vote_per_target (user_id, target_kind, target_id),
            INDEX (target_kind, target_id),
            CHECK (value IN (-1, 1)),
            FOREIGN KEY (user_id) REFERENCES {}.users(id) ON DELETE CASCADE
        )",
        schema_name, schema_name
    );
    server_pool.get_conn().await?.query_drop(query).await?;

    let query = format!(
        r"CREATE TABLE IF NOT EXISTS {}.notifications (
            id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
            recipient_id BIGINT UNSIGNED NOT NULL,
            type VARCHAR(50) NOT NULL,
            content TEXT,
            is_read BOOLEAN NOT NULL DEFAULT FALSE,
            created_at BIGINT NOT NULL,
            INDEX (recipient_id),
            FOREIGN KEY (recipient_id) REFERENCES {}.users(id) ON DELETE CASCADE
        )",
        schema_name, schema_name
    );
    server_pool.get_conn().await?.query_drop(query).await?;

    let query = format!(
        r"CREATE TABLE IF NOT EXISTS {}.sessions (
            token VARCHAR(64) PRIMARY KEY,
            user_id BIGINT UNSIGNED NOT NULL,
            expires_at BIGINT NOT NULL,
            created_at BIGINT NOT NULL,
            INDEX (user_id),
            FOREIGN KEY (user_id) REFERENCES {}.users(id) ON DELETE CASCADE
        )",
        schema_name, schema_name
    );
    server_pool.get_conn().await?.query_drop(query).await?;

    Ok(())
}

pub async fn reset_db(schema_name: &str) -> anyhow::Result<()> {
    let server_pool = server_pool()?;
    drop_db(&server_pool, schema_name).await?;
    create_db(&server_pool, schema_name).await?;

    Ok(())
}

pub async fn create_db_if_needed(schema_name: &str) -> anyhow::Result<()> {
    let server_pool = server_pool()?;
    create_db(&server_pool, schema_name).await?;

    Ok(())
}

pub async fn can_connect_to_db(schema_name: &str) -> anyhow::Result<bool> {
    let pool = db_pool(schema_name)?;
    let mut conn = pool.get_conn().await?;
    conn.ping().await?;

    Ok(true)
}

use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use log::info;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::answer::AnswerView;
use crate::error::Error;
use crate::notification::Notification;
use crate::question::{ListFilter, QuestionView};
use crate::store::ForumStore;
use crate::tag::Tag;
use crate::user::{Session, User, UserView};
use crate::vote::{Direction, VoteOutcome, VoteTarget};
use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, SESSION_EXPIRY_SECONDS};

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAnswer {
    pub content: String,
}

/// Listing parameters: a filter, an optional tag set (match-any), and
/// a pagination window.
#[derive(Debug, Clone)]
pub struct ListingRequest {
    pub filter: ListFilter,
    pub tags: Vec<String>,
    pub limit: u32,
    pub offset: u32,
}

impl ListingRequest {
    pub fn parse(
        filter: &str,
        tags: Vec<String>,
        limit: Option<i64>,
        skip: Option<i64>,
    ) -> Result<Self, Error> {
        let filter = ListFilter::parse(filter)?;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE as i64);
        if limit < 1 || limit > MAX_PAGE_SIZE as i64 {
            return Err(Error::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        let skip = skip.unwrap_or(0);
        if skip < 0 {
            return Err(Error::Validation("skip must be non-negative".to_string()));
        }
        Ok(Self {
            filter,
            tags,
            limit: limit as u32,
            offset: skip as u32,
        })
    }
}

/// A page of questions. `has_more` is a heuristic: true when the page
/// came back exactly full, not a count-based signal.
#[derive(Debug, Clone, Serialize)]
pub struct ListingPage {
    pub questions: Vec<QuestionView>,
    pub has_more: bool,
}

#[derive(Clone)]
pub struct Forum(Arc<dyn ForumStore + Send + Sync>);

impl Forum {
    pub fn new(inner: Arc<dyn ForumStore + Send + Sync>) -> Self {
        Self(inner)
    }
}

// auth
impl Forum {
    pub async fn register(&self, reg: Registration) -> Result<UserView, Error> {
        let username = reg.username.trim();
        let email = reg.email.trim();
        if username.is_empty() {
            return Err(Error::Validation("username must not be empty".to_string()));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(Error::Validation("a valid email is required".to_string()));
        }
        if reg.password.is_empty() {
            return Err(Error::Validation("password must not be empty".to_string()));
        }
        if self.0.user_by_username(username).await?.is_some() {
            return Err(Error::Conflict("username already taken".to_string()));
        }
        if self.0.user_by_email(email).await?.is_some() {
            return Err(Error::Conflict("email already registered".to_string()));
        }

        let password_hash = bcrypt::hash(&reg.password, bcrypt::DEFAULT_COST)
            .map_err(|e| Error::Storage(e.into()))?;
        let id = self
            .0
            .insert_user(username, email, &password_hash, "user", now())
            .await?;
        info!("registered user {} ({})", username, id);

        let user = self
            .0
            .user_by_id(id)
            .await?
            .ok_or_else(|| Error::Storage(anyhow::anyhow!("user missing after insert")))?;
        Ok(UserView::from(&user))
    }

    /// Credential check that issues an opaque bearer token. The token
    /// is the session identity for every later mutating request.
    pub async fn login(&self, username: &str, password: &str) -> Result<(String, UserView), Error> {
        let user = self
            .0
            .user_by_username(username)
            .await?
            .ok_or_else(|| Error::Unauthorized("invalid username or password".to_string()))?;
        let matches = bcrypt::verify(password, &user.password_hash)
            .map_err(|e| Error::Storage(e.into()))?;
        if !matches {
            return Err(Error::Unauthorized("invalid username or password".to_string()));
        }

        let session = Session {
            token: new_session_token(),
            user_id: user.id,
            expires_at: now() + SESSION_EXPIRY_SECONDS,
            created_at: now(),
        };
        self.0.insert_session(&session).await?;
        info!("user {} logged in", user.username);
        Ok((session.token, UserView::from(&user)))
    }

    /// Revoking a token is idempotent.
    pub async fn logout(&self, token: &str) -> Result<(), Error> {
        self.0.delete_session(token).await?;
        Ok(())
    }

    pub async fn authenticate(&self, token: &str) -> Result<User, Error> {
        let session = self
            .0
            .session_by_token(token)
            .await?
            .ok_or_else(|| Error::Unauthorized("invalid session token".to_string()))?;
        if session.expires_at < now() {
            self.0.delete_session(token).await?;
            return Err(Error::Unauthorized("session expired".to_string()));
        }
        self.0
            .user_by_id(session.user_id)
            .await?
            .ok_or_else(|| Error::Unauthorized("invalid session token".to_string()))
    }
}

// questions
impl Forum {
    pub async fn create_question(&self, author: &User, new: NewQuestion) -> Result<QuestionView, Error> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(Error::Validation("title must not be empty".to_string()));
        }

        let id = self
            .0
            .insert_question(author.id, title, &new.description, now())
            .await?;

        // get-or-create each tag, de-duplicated within the request
        let mut seen = HashSet::new();
        for name in &new.tags {
            let name = name.trim();
            if name.is_empty() || !seen.insert(name.to_string()) {
                continue;
            }
            let tag_id = self.0.ensure_tag(name).await?;
            self.0.link_tag(id, tag_id).await?;
        }
        info!("user {} asked question {}", author.username, id);

        self.question_view(id, true).await
    }

    pub async fn update_question(
        &self,
        actor: &User,
        id: u64,
        title: &str,
        description: &str,
    ) -> Result<QuestionView, Error> {
        let question = self
            .0
            .question_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no question with id {}", id)))?;
        if question.author_id != actor.id {
            return Err(Error::Forbidden(
                "only the author may edit a question".to_string(),
            ));
        }
        if title.trim().is_empty() {
            return Err(Error::Validation("title must not be empty".to_string()));
        }
        self.0.update_question(id, title.trim(), description).await?;
        self.question_view(id, true).await
    }

    pub async fn delete_question(&self, actor: &User, id: u64) -> Result<(), Error> {
        let question = self
            .0
            .question_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no question with id {}", id)))?;
        if question.author_id != actor.id {
            return Err(Error::Forbidden(
                "only the author may delete a question".to_string(),
            ));
        }
        self.0.delete_question(id).await?;
        info!("user {} deleted question {}", actor.username, id);
        Ok(())
    }

    pub async fn list_questions(&self, req: ListingRequest) -> Result<ListingPage, Error> {
        let summaries = self
            .0
            .list_questions(req.filter, &req.tags, req.limit, req.offset)
            .await?;
        let now = now();

        let mut questions = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let tags = self.0.tags_for_question(summary.id).await?;
            let answers = self
                .0
                .answers_for_question(summary.id)
                .await?
                .into_iter()
                .map(|a| AnswerView::new(a, now))
                .collect();
            questions.push(QuestionView::new(summary, tags, answers, now));
        }

        let has_more = questions.len() as u32 == req.limit;
        Ok(ListingPage { questions, has_more })
    }

    pub async fn question_view(&self, id: u64, include_answers: bool) -> Result<QuestionView, Error> {
        let summary = self
            .0
            .question_summary(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no question with id {}", id)))?;
        let now = now();
        let tags = self.0.tags_for_question(id).await?;
        let answers = if include_answers {
            self.0
                .answers_for_question(id)
                .await?
                .into_iter()
                .map(|a| AnswerView::new(a, now))
                .collect()
        } else {
            Vec::new()
        };
        Ok(QuestionView::new(summary, tags, answers, now))
    }
}

// answers
impl Forum {
    pub async fn create_answer(
        &self,
        author: &User,
        question_id: u64,
        new: NewAnswer,
    ) -> Result<AnswerView, Error> {
        if new.content.trim().is_empty() {
            return Err(Error::Validation("content must not be empty".to_string()));
        }
        let question = self
            .0
            .question_by_id(question_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no question with id {}", question_id)))?;

        let id = self
            .0
            .insert_answer(question_id, author.id, new.content.trim(), now())
            .await?;
        info!("user {} answered question {}", author.username, question_id);

        if question.author_id != author.id {
            self.0
                .insert_notification(
                    question.author_id,
                    "answer",
                    &format!("{} answered your question \"{}\"", author.username, question.title),
                    now(),
                )
                .await?;
        }

        Ok(AnswerView {
            id,
            content: new.content.trim().to_string(),
            author: author.username.clone(),
            score: 0,
            is_accepted: false,
            time: "Just now".to_string(),
        })
    }

    pub async fn update_answer(
        &self,
        actor: &User,
        question_id: u64,
        answer_id: u64,
        content: &str,
    ) -> Result<(), Error> {
        let answer = self
            .0
            .answer_by_id(answer_id)
            .await?
            .filter(|a| a.question_id == question_id)
            .ok_or_else(|| Error::NotFound(format!("no answer with id {}", answer_id)))?;
        if answer.author_id != actor.id {
            return Err(Error::Forbidden(
                "only the author may edit an answer".to_string(),
            ));
        }
        if content.trim().is_empty() {
            return Err(Error::Validation("content must not be empty".to_string()));
        }
        self.0.update_answer(answer_id, content.trim()).await?;
        Ok(())
    }

    pub async fn delete_answer(
        &self,
        actor: &User,
        question_id: u64,
        answer_id: u64,
    ) -> Result<(), Error> {
        let answer = self
            .0
            .answer_by_id(answer_id)
            .await?
            .filter(|a| a.question_id == question_id)
            .ok_or_else(|| Error::NotFound(format!("no answer with id {}", answer_id)))?;
        if answer.author_id != actor.id {
            return Err(Error::Forbidden(
                "only the author may delete an answer".to_string(),
            ));
        }
        self.0.delete_answer(answer_id).await?;
        Ok(())
    }

    /// Marks exactly one answer as accepted for the question. Only the
    /// question's author may accept, the answer must belong to the
    /// question, and acceptance is exclusive.
    pub async fn accept_answer(
        &self,
        actor: &User,
        question_id: u64,
        answer_id: u64,
    ) -> Result<(), Error> {
        let question = self
            .0
            .question_by_id(question_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no question with id {}", question_id)))?;
        let answer = self
            .0
            .answer_by_id(answer_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no answer with id {}", answer_id)))?;
        if answer.question_id != question_id {
            return Err(Error::NotFound(format!(
                "answer {} does not belong to question {}",
                answer_id, question_id
            )));
        }
        if question.author_id != actor.id {
            return Err(Error::Forbidden(
                "only the question author may accept an answer".to_string(),
            ));
        }
        self.0.set_accepted_answer(question_id, answer_id).await?;
        info!(
            "user {} accepted answer {} on question {}",
            actor.username, answer_id, question_id
        );
        Ok(())
    }
}

// votes
impl Forum {
    /// The vote toggle rule: same direction removes the vote, the
    /// opposite direction flips it, no prior vote creates one. Returns
    /// the authoritative score recomputed from all vote rows.
    pub async fn cast_vote(
        &self,
        voter: &User,
        target: VoteTarget,
        direction: Direction,
    ) -> Result<VoteOutcome, Error> {
        match target {
            VoteTarget::Question(id) => {
                self.0
                    .question_by_id(id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("no question with id {}", id)))?;
            }
            VoteTarget::Answer(id) => {
                self.0
                    .answer_by_id(id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("no answer with id {}", id)))?;
            }
        }
        let outcome = self
            .0
            .apply_vote(voter.id, target, direction.value(), now())
            .await?;
        Ok(outcome)
    }
}

// tags and notifications
impl Forum {
    pub async fn all_tags(&self) -> Result<Vec<Tag>, Error> {
        Ok(self.0.all_tags().await?)
    }

    pub async fn tag_by_id(&self, id: u64) -> Result<Tag, Error> {
        self.0
            .tag_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no tag with id {}", id)))
    }

    pub async fn notifications(&self, user: &User) -> Result<Vec<Notification>, Error> {
        Ok(self.0.notifications_for_user(user.id).await?)
    }

    pub async fn mark_notification_read(&self, user: &User, id: u64) -> Result<(), Error> {
        if !self.0.mark_notification_read(user.id, id).await? {
            return Err(Error::NotFound(format!("no notification with id {}", id)));
        }
        Ok(())
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn new_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

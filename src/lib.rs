mod answer;
mod db_store;
mod error;
mod forum;
mod logging;
mod mem_store;
mod notification;
mod question;
mod server;
mod store;
mod tag;
mod user;
mod vote;

pub use answer::{Answer, AnswerSummary, AnswerView};
pub use db_store::{can_connect_to_db, create_db_if_needed, reset_db};
pub use error::Error;
pub use forum::{Forum, ListingPage, ListingRequest, NewAnswer, NewQuestion, Registration};
pub use logging::setup_log;
pub use notification::Notification;
pub use question::{format_time_ago, ListFilter, Question, QuestionSummary, QuestionView};
pub use server::{make_routes, start_server};
pub use store::ForumStore;
pub use tag::Tag;
pub use user::{Session, User, UserView};
pub use vote::{Direction, VoteOutcome, VoteTarget};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const SESSION_EXPIRY_SECONDS: i64 = 60 * 60 * 24 * 7;

use log::info;
use nu_ansi_term::Color::Green;
use serde::Deserialize;
use serde_json::json;
use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply},
    Filter,
};

use crate::db_store::create_db_if_needed;
use crate::error::{return_error, Error};
use crate::forum::{Forum, ListingRequest, NewAnswer, NewQuestion, Registration};
use crate::user::User;
use crate::vote::{Direction, VoteTarget};

pub async fn start_server(schema_name: &str, port: u16) -> anyhow::Result<()> {
    create_db_if_needed(schema_name).await?;
    let forum = Forum::new_db(schema_name).await?;

    let routes = make_routes(forum);

    let host = "0.0.0.0"; // 127.0.0.1 won't work inside docker.
    let addr = format!("{}:{}", host, port);
    let socket_addr = addr.parse::<std::net::SocketAddr>()?;

    info!(
        "{}",
        Green.paint(format!("Starting Q&A server on {}:{}", host, port))
    );
    warp::serve(routes).run(socket_addr).await;

    Ok(())
}

pub fn make_routes(forum: Forum) -> BoxedFilter<(impl Reply,)> {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"]);

    let routes = status_filter()
        .or(auth_routes(forum.clone()))
        .or(question_routes(forum.clone()))
        .or(answer_routes(forum.clone()))
        .or(tag_routes(forum.clone()))
        .or(notification_routes(forum))
        .with(cors)
        .recover(return_error);

    routes.boxed()
}

fn with_forum(forum: Forum) -> impl Filter<Extract = (Forum,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || forum.clone())
}

/// Resolves the acting user from the bearer token. The session
/// identity wins over any user id a request body might carry.
fn with_auth(forum: Forum) -> impl Filter<Extract = (User,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_forum(forum))
        .and_then(|header: Option<String>, forum: Forum| async move {
            let token = header
                .as_deref()
                .and_then(|h| h.strip_prefix("Bearer "))
                .ok_or_else(|| {
                    warp::reject::custom(Error::Unauthorized(
                        "missing bearer token".to_string(),
                    ))
                })?;
            forum
                .authenticate(token)
                .await
                .map_err(warp::reject::custom)
        })
}

fn status_filter() -> BoxedFilter<(impl Reply,)> {
    warp::path!("api" / "status")
        .and(warp::get())
        .and_then(status_handler)
        .boxed()
}

fn auth_routes(forum: Forum) -> BoxedFilter<(impl Reply,)> {
    let register = warp::path!("api" / "register")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_forum(forum.clone()))
        .and_then(register_handler);

    let login = warp::path!("api" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_forum(forum.clone()))
        .and_then(login_handler);

    let logout = warp::path!("api" / "logout")
        .and(warp::post())
        .and(warp::header::optional::<String>("authorization"))
        .and(with_forum(forum))
        .and_then(logout_handler);

    register.or(login).or(logout).boxed()
}

fn question_routes(forum: Forum) -> BoxedFilter<(impl Reply,)> {
    let get_questions = warp::path!("api" / "db" / "getQuestions")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_forum(forum.clone()))
        .and_then(get_questions_handler);

    let create = warp::path!("api" / "questions")
        .and(warp::post())
        .and(with_auth(forum.clone()))
        .and(warp::body::json())
        .and(with_forum(forum.clone()))
        .and_then(create_question_handler);

    let update = warp::path!("api" / "questions" / u64)
        .and(warp::put())
        .and(with_auth(forum.clone()))
        .and(warp::body::json())
        .and(with_forum(forum.clone()))
        .and_then(update_question_handler);

    let delete = warp::path!("api" / "questions" / u64)
        .and(warp::delete())
        .and(with_auth(forum.clone()))
        .and(with_forum(forum.clone()))
        .and_then(delete_question_handler);

    let vote = warp::path!("api" / "questions" / u64 / "vote")
        .and(warp::post())
        .and(with_auth(forum.clone()))
        .and(warp::body::json())
        .and(with_forum(forum))
        .and_then(vote_question_handler);

    get_questions.or(create).or(update).or(delete).or(vote).boxed()
}

fn answer_routes(forum: Forum) -> BoxedFilter<(impl Reply,)> {
    let create = warp::path!("api" / "questions" / u64 / "answers")
        .and(warp::post())
        .and(with_auth(forum.clone()))
        .and(warp::body::json())
        .and(with_forum(forum.clone()))
        .and_then(create_answer_handler);

    let update = warp::path!("api" / "questions" / u64 / "answers" / u64)
        .and(warp::put())
        .and(with_auth(forum.clone()))
        .and(warp::body::json())
        .and(with_forum(forum.clone()))
        .and_then(update_answer_handler);

    let delete = warp::path!("api" / "questions" / u64 / "answers" / u64)
        .and(warp::delete())
        .and(with_auth(forum.clone()))
        .and(with_forum(forum.clone()))
        .and_then(delete_answer_handler);

    let vote = warp::path!("api" / "questions" / u64 / "answers" / u64 / "vote")
        .and(warp::post())
        .and(with_auth(forum.clone()))
        .and(warp::body::json())
        .and(with_forum(forum.clone()))
        .and_then(vote_answer_handler);

    let accept = warp::path!("api" / "questions" / u64 / "answers" / u64 / "accept")
        .and(warp::post())
        .and(with_auth(forum.clone()))
        .and(with_forum(forum))
        .and_then(accept_answer_handler);

    create.or(update).or(delete).or(vote).or(accept).boxed()
}

fn tag_routes(forum: Forum) -> BoxedFilter<(impl Reply,)> {
    let all = warp::path!("api" / "db" / "getAllTags")
        .and(warp::get())
        .and(with_forum(forum.clone()))
        .and_then(all_tags_handler);

    let by_id = warp::path!("api" / "db" / "getTagById" / u64)
        .and(warp::get())
        .and(with_forum(forum))
        .and_then(tag_by_id_handler);

    all.or(by_id).boxed()
}

fn notification_routes(forum: Forum) -> BoxedFilter<(impl Reply,)> {
    let list = warp::path!("api" / "notifications")
        .and(warp::get())
        .and(with_auth(forum.clone()))
        .and(with_forum(forum.clone()))
        .and_then(notifications_handler);

    let read = warp::path!("api" / "notifications" / u64 / "read")
        .and(warp::post())
        .and(with_auth(forum.clone()))
        .and(with_forum(forum))
        .and_then(notification_read_handler);

    list.or(read).boxed()
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetQuestionsBody {
    id: Option<u64>,
    #[serde(default)]
    include_answers: bool,
    filter: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    limit: Option<i64>,
    skip: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct VoteBody {
    direction: String,
}

#[derive(Debug, Deserialize)]
struct UpdateQuestionBody {
    title: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct UpdateAnswerBody {
    content: String,
}

fn ok_reply(data: impl serde::Serialize) -> warp::reply::WithStatus<warp::reply::Json> {
    reply::with_status(
        reply::json(&json!({ "success": true, "data": data })),
        StatusCode::OK,
    )
}

fn created_reply(data: impl serde::Serialize) -> warp::reply::WithStatus<warp::reply::Json> {
    reply::with_status(
        reply::json(&json!({ "success": true, "data": data })),
        StatusCode::CREATED,
    )
}

async fn status_handler() -> Result<impl Reply, Rejection> {
    Ok(reply::json(&json!({
        "success": true,
        "message": "Q&A API is running"
    })))
}

async fn register_handler(body: Registration, forum: Forum) -> Result<impl Reply, Rejection> {
    let user = forum.register(body).await.map_err(warp::reject::custom)?;
    Ok(created_reply(user))
}

async fn login_handler(body: LoginBody, forum: Forum) -> Result<impl Reply, Rejection> {
    let (token, user) = forum
        .login(&body.username, &body.password)
        .await
        .map_err(warp::reject::custom)?;
    Ok(reply::with_status(
        reply::json(&json!({ "success": true, "token": token, "user": user })),
        StatusCode::OK,
    ))
}

async fn logout_handler(header: Option<String>, forum: Forum) -> Result<impl Reply, Rejection> {
    if let Some(token) = header.as_deref().and_then(|h| h.strip_prefix("Bearer ")) {
        forum.logout(token).await.map_err(warp::reject::custom)?;
    }
    Ok(reply::json(&json!({ "success": true })))
}

async fn get_questions_handler(body: GetQuestionsBody, forum: Forum) -> Result<impl Reply, Rejection> {
    // Single-id fetch and filtered listing share the endpoint.
    if let Some(id) = body.id {
        let question = forum
            .question_view(id, body.include_answers)
            .await
            .map_err(warp::reject::custom)?;
        return Ok(ok_reply(question));
    }

    let filter = body.filter.ok_or_else(|| {
        warp::reject::custom(Error::Validation(
            "filter must be one of topvoted, newest, unanswered".to_string(),
        ))
    })?;
    let request = ListingRequest::parse(&filter, body.tags.clone(), body.limit, body.skip)
        .map_err(warp::reject::custom)?;
    let limit = request.limit;
    let skip = request.offset;
    let page = forum
        .list_questions(request)
        .await
        .map_err(warp::reject::custom)?;

    Ok(reply::with_status(
        reply::json(&json!({
            "success": true,
            "data": page.questions,
            "count": page.questions.len(),
            "filter": filter,
            "tags": body.tags,
            "pagination": { "limit": limit, "skip": skip, "hasMore": page.has_more },
        })),
        StatusCode::OK,
    ))
}

async fn create_question_handler(
    user: User,
    body: NewQuestion,
    forum: Forum,
) -> Result<impl Reply, Rejection> {
    let question = forum
        .create_question(&user, body)
        .await
        .map_err(warp::reject::custom)?;
    Ok(created_reply(question))
}

async fn update_question_handler(
    id: u64,
    user: User,
    body: UpdateQuestionBody,
    forum: Forum,
) -> Result<impl Reply, Rejection> {
    let question = forum
        .update_question(&user, id, &body.title, &body.description)
        .await
        .map_err(warp::reject::custom)?;
    Ok(ok_reply(question))
}

async fn delete_question_handler(id: u64, user: User, forum: Forum) -> Result<impl Reply, Rejection> {
    forum
        .delete_question(&user, id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(reply::with_status(
        reply::json(&json!({ "success": true })),
        StatusCode::OK,
    ))
}

async fn vote_question_handler(
    id: u64,
    user: User,
    body: VoteBody,
    forum: Forum,
) -> Result<impl Reply, Rejection> {
    let direction = Direction::parse(&body.direction).map_err(warp::reject::custom)?;
    let outcome = forum
        .cast_vote(&user, VoteTarget::Question(id), direction)
        .await
        .map_err(warp::reject::custom)?;
    Ok(ok_reply(outcome))
}

async fn create_answer_handler(
    question_id: u64,
    user: User,
    body: NewAnswer,
    forum: Forum,
) -> Result<impl Reply, Rejection> {
    let answer = forum
        .create_answer(&user, question_id, body)
        .await
        .map_err(warp::reject::custom)?;
    Ok(created_reply(answer))
}

async fn update_answer_handler(
    question_id: u64,
    answer_id: u64,
    user: User,
    body: UpdateAnswerBody,
    forum: Forum,
) -> Result<impl Reply, Rejection> {
    forum
        .update_answer(&user, question_id, answer_id, &body.content)
        .await
        .map_err(warp::reject::custom)?;
    Ok(reply::with_status(
        reply::json(&json!({ "success": true })),
        StatusCode::OK,
    ))
}

async fn delete_answer_handler(
    question_id: u64,
    answer_id: u64,
    user: User,
    forum: Forum,
) -> Result<impl Reply, Rejection> {
    forum
        .delete_answer(&user, question_id, answer_id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(reply::with_status(
        reply::json(&json!({ "success": true })),
        StatusCode::OK,
    ))
}

async fn vote_answer_handler(
    _question_id: u64,
    answer_id: u64,
    user: User,
    body: VoteBody,
    forum: Forum,
) -> Result<impl Reply, Rejection> {
    let direction = Direction::parse(&body.direction).map_err(warp::reject::custom)?;
    let outcome = forum
        .cast_vote(&user, VoteTarget::Answer(answer_id), direction)
        .await
        .map_err(warp::reject::custom)?;
    Ok(ok_reply(outcome))
}

async fn accept_answer_handler(
    question_id: u64,
    answer_id: u64,
    user: User,
    forum: Forum,
) -> Result<impl Reply, Rejection> {
    forum
        .accept_answer(&user, question_id, answer_id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(reply::with_status(
        reply::json(&json!({ "success": true })),
        StatusCode::OK,
    ))
}

async fn all_tags_handler(forum: Forum) -> Result<impl Reply, Rejection> {
    let tags = forum.all_tags().await.map_err(warp::reject::custom)?;
    Ok(reply::with_status(
        reply::json(&json!({ "success": true, "data": tags, "count": tags.len() })),
        StatusCode::OK,
    ))
}

async fn tag_by_id_handler(id: u64, forum: Forum) -> Result<impl Reply, Rejection> {
    let tag = forum.tag_by_id(id).await.map_err(warp::reject::custom)?;
    Ok(ok_reply(tag))
}

async fn notifications_handler(user: User, forum: Forum) -> Result<impl Reply, Rejection> {
    let notifications = forum
        .notifications(&user)
        .await
        .map_err(warp::reject::custom)?;
    Ok(reply::with_status(
        reply::json(&json!({
            "success": true,
            "data": notifications,
            "count": notifications.len(),
        })),
        StatusCode::OK,
    ))
}

async fn notification_read_handler(id: u64, user: User, forum: Forum) -> Result<impl Reply, Rejection> {
    forum
        .mark_notification_read(&user, id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(reply::with_status(
        reply::json(&json!({ "success": true })),
        StatusCode::OK,
    ))
}

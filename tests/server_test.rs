use log::info;
use nu_ansi_term::Color::{Cyan, Red};
use serde_json::{json, Value};
use warp::{filters::BoxedFilter, reply::Reply, test::request, Filter};

use qna::{make_routes, setup_log, Forum};

type Routes = BoxedFilter<(Box<dyn Reply>,)>;

fn routes() -> Routes {
    make_routes(Forum::new_in_memory())
        .map(|r| Box::new(r) as Box<dyn Reply>)
        .boxed()
}

async fn register_and_login(routes: &Routes, username: &str) -> String {
    let result = request()
        .method("POST")
        .path("/api/register")
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "correct horse battery staple",
        }))
        .reply(routes)
        .await;
    assert_eq!(result.status(), 201, "{:?}", result.body());

    let result = request()
        .method("POST")
        .path("/api/login")
        .json(&json!({
            "username": username,
            "password": "correct horse battery staple",
        }))
        .reply(routes)
        .await;
    assert_eq!(result.status(), 200, "{:?}", result.body());
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    assert_eq!(body["user"]["username"], username);
    body["token"].as_str().unwrap().to_string()
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

#[tokio::test]
async fn test_api_scenario() {
    setup_log();
    let routes = routes();

    info!("{}", Cyan.paint("=== Alice and Bob sign up over the API"));
    let alice = register_and_login(&routes, "alice").await;
    let bob = register_and_login(&routes, "bob").await;

    info!("{}", Red.paint("=== A duplicate username is rejected with 409"));
    let result = request()
        .method("POST")
        .path("/api/register")
        .json(&json!({
            "username": "alice",
            "email": "other@example.com",
            "password": "another password",
        }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 409);
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    assert_eq!(body["success"], false);

    info!("{}", Red.paint("=== A wrong password is rejected with 401"));
    let result = request()
        .method("POST")
        .path("/api/login")
        .json(&json!({ "username": "alice", "password": "nope" }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 401);

    info!("{}", Cyan.paint("=== Alice posts a question with tags"));
    let result = request()
        .method("POST")
        .path("/api/questions")
        .header("authorization", bearer(&alice))
        .json(&json!({
            "title": "How to join 2 columns in SQL?",
            "description": "I want a column combining first and last name.",
            "tags": ["sql", "beginners"],
        }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 201, "{:?}", result.body());
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    let question_id = body["data"]["id"].as_u64().unwrap();
    assert_eq!(body["data"]["tags"], json!(["beginners", "sql"]));
    assert_eq!(body["data"]["author"], "alice");
    assert_eq!(body["data"]["time"], "Just now");

    info!("{}", Red.paint("=== An empty title is rejected with 400"));
    let result = request()
        .method("POST")
        .path("/api/questions")
        .header("authorization", bearer(&alice))
        .json(&json!({ "title": "  ", "description": "d" }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 400);

    info!("{}", Cyan.paint("=== The listing endpoint returns a paginated envelope"));
    let result = request()
        .method("POST")
        .path("/api/db/getQuestions")
        .json(&json!({ "filter": "newest", "tags": ["sql"], "limit": 5 }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 200, "{:?}", result.body());
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 1);
    assert_eq!(body["filter"], "newest");
    assert_eq!(body["tags"], json!(["sql"]));
    assert_eq!(body["pagination"]["limit"], 5);
    assert_eq!(body["pagination"]["skip"], 0);
    assert_eq!(body["pagination"]["hasMore"], false);
    assert_eq!(body["data"][0]["id"], question_id);

    info!("{}", Red.paint("=== An unknown filter is rejected with 400"));
    let result = request()
        .method("POST")
        .path("/api/db/getQuestions")
        .json(&json!({ "filter": "trending" }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 400);

    info!("{}", Cyan.paint("=== Voting walks the toggle: up, up again, down"));
    let result = request()
        .method("POST")
        .path(&format!("/api/questions/{}/vote", question_id))
        .header("authorization", bearer(&bob))
        .json(&json!({ "direction": "up" }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 200, "{:?}", result.body());
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    assert_eq!(body["data"]["vote"], 1);
    assert_eq!(body["data"]["votes"], 1);

    let result = request()
        .method("POST")
        .path(&format!("/api/questions/{}/vote", question_id))
        .header("authorization", bearer(&bob))
        .json(&json!({ "direction": "up" }))
        .reply(&routes)
        .await;
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    assert_eq!(body["data"]["vote"], Value::Null);
    assert_eq!(body["data"]["votes"], 0);

    let result = request()
        .method("POST")
        .path(&format!("/api/questions/{}/vote", question_id))
        .header("authorization", bearer(&bob))
        .json(&json!({ "direction": "down" }))
        .reply(&routes)
        .await;
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    assert_eq!(body["data"]["vote"], -1);
    assert_eq!(body["data"]["votes"], -1);

    info!("{}", Red.paint("=== A bad vote direction is rejected with 400"));
    let result = request()
        .method("POST")
        .path(&format!("/api/questions/{}/vote", question_id))
        .header("authorization", bearer(&bob))
        .json(&json!({ "direction": "sideways" }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 400);

    info!("{}", Cyan.paint("=== Bob answers Alice's question"));
    let result = request()
        .method("POST")
        .path(&format!("/api/questions/{}/answers", question_id))
        .header("authorization", bearer(&bob))
        .json(&json!({ "content": "Use CONCAT(first_name, ' ', last_name)." }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 201, "{:?}", result.body());
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    let answer_id = body["data"]["id"].as_u64().unwrap();
    assert_eq!(body["data"]["isAccepted"], false);

    info!("{}", Cyan.paint("=== Alice sees the answer notification"));
    let result = request()
        .path("/api/notifications")
        .header("authorization", bearer(&alice))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 200);
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    assert_eq!(body["count"], 1);
    let notification_id = body["data"][0]["id"].as_u64().unwrap();
    assert_eq!(body["data"][0]["type"], "answer");
    assert_eq!(body["data"][0]["is_read"], false);

    let result = request()
        .method("POST")
        .path(&format!("/api/notifications/{}/read", notification_id))
        .header("authorization", bearer(&alice))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 200);

    info!("{}", Red.paint("=== Only the question author may accept: 403 for Bob"));
    let result = request()
        .method("POST")
        .path(&format!(
            "/api/questions/{}/answers/{}/accept",
            question_id, answer_id
        ))
        .header("authorization", bearer(&bob))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 403);

    info!("{}", Cyan.paint("=== Alice accepts Bob's answer"));
    let result = request()
        .method("POST")
        .path(&format!(
            "/api/questions/{}/answers/{}/accept",
            question_id, answer_id
        ))
        .header("authorization", bearer(&alice))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 200, "{:?}", result.body());

    let result = request()
        .method("POST")
        .path("/api/db/getQuestions")
        .json(&json!({ "id": question_id, "includeAnswers": true }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 200);
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    assert_eq!(body["data"]["answers"][0]["id"], answer_id);
    assert_eq!(body["data"]["answers"][0]["isAccepted"], true);

    info!("{}", Cyan.paint("=== Tags are listed and fetched by id"));
    let result = request().path("/api/db/getAllTags").reply(&routes).await;
    assert_eq!(result.status(), 200);
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    assert_eq!(body["count"], 2);
    let tag_id = body["data"][0]["id"].as_u64().unwrap();

    let result = request()
        .path(&format!("/api/db/getTagById/{}", tag_id))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 200);
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    assert_eq!(body["data"]["id"], tag_id);

    let result = request().path("/api/db/getTagById/999").reply(&routes).await;
    assert_eq!(result.status(), 404);

    info!("{}", Red.paint("=== A missing question is a 404"));
    let result = request()
        .method("POST")
        .path("/api/db/getQuestions")
        .json(&json!({ "id": 999 }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 404);

    info!("{}", Cyan.paint("=== Logout revokes Bob's token"));
    let result = request()
        .method("POST")
        .path("/api/logout")
        .header("authorization", bearer(&bob))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 200);

    let result = request()
        .method("POST")
        .path(&format!("/api/questions/{}/vote", question_id))
        .header("authorization", bearer(&bob))
        .json(&json!({ "direction": "up" }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 401);
}

#[tokio::test]
async fn test_editing_is_author_only() {
    setup_log();
    let routes = routes();

    let alice = register_and_login(&routes, "alice").await;
    let mallory = register_and_login(&routes, "mallory").await;

    let result = request()
        .method("POST")
        .path("/api/questions")
        .header("authorization", bearer(&alice))
        .json(&json!({ "title": "Original title", "description": "d" }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 201);
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    let question_id = body["data"]["id"].as_u64().unwrap();

    info!("{}", Red.paint("=== Mallory cannot edit or delete Alice's question"));
    let result = request()
        .method("PUT")
        .path(&format!("/api/questions/{}", question_id))
        .header("authorization", bearer(&mallory))
        .json(&json!({ "title": "Hijacked", "description": "d" }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 403);

    let result = request()
        .method("DELETE")
        .path(&format!("/api/questions/{}", question_id))
        .header("authorization", bearer(&mallory))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 403);

    info!("{}", Cyan.paint("=== Alice edits and then deletes her question"));
    let result = request()
        .method("PUT")
        .path(&format!("/api/questions/{}", question_id))
        .header("authorization", bearer(&alice))
        .json(&json!({ "title": "Clarified title", "description": "more detail" }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 200);
    let body: Value = serde_json::from_slice(result.body()).unwrap();
    assert_eq!(body["data"]["title"], "Clarified title");

    let result = request()
        .method("DELETE")
        .path(&format!("/api/questions/{}", question_id))
        .header("authorization", bearer(&alice))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 200);

    let result = request()
        .method("POST")
        .path("/api/db/getQuestions")
        .json(&json!({ "id": question_id }))
        .reply(&routes)
        .await;
    assert_eq!(result.status(), 404);
}

use log::{info, warn};
use nu_ansi_term::Color::{Cyan, Red};
use qna::{
    can_connect_to_db, create_db_if_needed, reset_db, setup_log, Direction, Error, Forum,
    ListFilter, ListingRequest, NewAnswer, NewQuestion, Registration, User, VoteTarget,
};

async fn signup(forum: &Forum, username: &str) -> User {
    forum
        .register(Registration {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "hunter2-but-longer".to_string(),
        })
        .await
        .unwrap();
    let (token, _) = forum.login(username, "hunter2-but-longer").await.unwrap();
    forum.authenticate(&token).await.unwrap()
}

fn listing(filter: ListFilter, tags: &[&str], limit: u32) -> ListingRequest {
    ListingRequest {
        filter,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        limit,
        offset: 0,
    }
}

/// Test against the Forum rules backed by the in-memory store.
#[tokio::test]
async fn test_in_memory_forum() {
    setup_log();
    let forum = Forum::new_in_memory();
    test_forum_scenario(&forum).await;
}

/// Test against the Forum rules backed by a database.
/// Requires a MySQL or MariaDB server running on localhost.
#[tokio::test]
async fn test_db_forum() {
    setup_log();
    let schema_name = "test_db_forum";
    match create_db_if_needed(schema_name).await {
        Ok(_) => {}
        Err(e) => {
            warn!(
                "Skipping test_db_forum because we can't connect to the database: {}",
                e
            );
            return;
        }
    }
    reset_db(schema_name).await.unwrap();
    assert!(can_connect_to_db(schema_name).await.unwrap());
    info!("Starting test_db_forum on database: {}", schema_name);
    let forum = Forum::new_db(schema_name).await.unwrap();
    test_forum_scenario(&forum).await;
}

async fn test_forum_scenario(forum: &Forum) {
    info!("{}", Cyan.paint("=== Alice and Bob register"));
    let alice = signup(forum, "alice").await;
    let bob = signup(forum, "bob").await;

    info!("{}", Red.paint("=== Registering a duplicate username is a conflict"));
    let err = forum
        .register(Registration {
            username: "alice".to_string(),
            email: "alice2@example.com".to_string(),
            password: "another-password".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "{}", err);

    info!("{}", Red.paint("=== Logging in with a wrong password fails"));
    let err = forum.login("alice", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)), "{}", err);

    info!("{}", Cyan.paint("=== Alice asks a question tagged sql + beginners"));
    let q1 = forum
        .create_question(
            &alice,
            NewQuestion {
                title: "How to join 2 columns in SQL?".to_string(),
                description: "I want a column combining first and last name.".to_string(),
                tags: vec!["sql".to_string(), "beginners".to_string(), "sql".to_string()],
            },
        )
        .await
        .unwrap();
    assert_eq!(q1.tags, vec!["beginners".to_string(), "sql".to_string()]);
    assert_eq!(q1.score, 0);
    assert_eq!(q1.time, "Just now");

    info!("{}", Cyan.paint("=== Bob asks a question sharing the sql tag"));
    let q2 = forum
        .create_question(
            &bob,
            NewQuestion {
                title: "What is a LEFT JOIN?".to_string(),
                description: "And how is it different from INNER JOIN?".to_string(),
                tags: vec!["sql".to_string()],
            },
        )
        .await
        .unwrap();

    info!("{}", Cyan.paint("=== A shared tag name produces a single tag row"));
    let tags = forum.all_tags().await.unwrap();
    let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["beginners", "sql"]);

    info!("{}", Cyan.paint("=== Filtering by tags is match-any"));
    let page = forum
        .list_questions(listing(ListFilter::Newest, &["sql"], 10))
        .await
        .unwrap();
    assert_eq!(page.questions.len(), 2);
    let page = forum
        .list_questions(listing(ListFilter::Newest, &["beginners"], 10))
        .await
        .unwrap();
    assert_eq!(page.questions.len(), 1);
    assert_eq!(page.questions[0].id, q1.id);
    let page = forum
        .list_questions(listing(ListFilter::Newest, &["css"], 10))
        .await
        .unwrap();
    assert!(page.questions.is_empty());

    info!("{}", Cyan.paint("=== Bob answers Alice's question twice"));
    let a1 = forum
        .create_answer(
            &bob,
            q1.id,
            NewAnswer {
                content: "Use CONCAT(first_name, ' ', last_name).".to_string(),
            },
        )
        .await
        .unwrap();
    let a2 = forum
        .create_answer(
            &bob,
            q1.id,
            NewAnswer {
                content: "Some dialects also support the || operator.".to_string(),
            },
        )
        .await
        .unwrap();

    info!("{}", Cyan.paint("=== Alice got notified about the answers"));
    let notifications = forum.notifications(&alice).await.unwrap();
    assert_eq!(notifications.len(), 2);
    assert!(!notifications[0].is_read);
    forum
        .mark_notification_read(&alice, notifications[0].id)
        .await
        .unwrap();
    let notifications = forum.notifications(&alice).await.unwrap();
    assert!(notifications.iter().any(|n| n.is_read));

    info!("{}", Cyan.paint("=== The unanswered filter omits answered questions"));
    let page = forum
        .list_questions(listing(ListFilter::Unanswered, &[], 10))
        .await
        .unwrap();
    assert_eq!(page.questions.len(), 1);
    assert_eq!(page.questions[0].id, q2.id);

    info!("{}", Cyan.paint("=== Vote walk on an answer: up, up again, down"));
    let outcome = forum
        .cast_vote(&alice, VoteTarget::Answer(a1.id), Direction::Up)
        .await
        .unwrap();
    assert_eq!(outcome.vote, Some(1));
    assert_eq!(outcome.votes, 1);
    let outcome = forum
        .cast_vote(&alice, VoteTarget::Answer(a1.id), Direction::Up)
        .await
        .unwrap();
    assert_eq!(outcome.vote, None, "same direction toggles the vote off");
    assert_eq!(outcome.votes, 0);
    let outcome = forum
        .cast_vote(&alice, VoteTarget::Answer(a1.id), Direction::Down)
        .await
        .unwrap();
    assert_eq!(outcome.vote, Some(-1));
    assert_eq!(outcome.votes, -1);

    info!("{}", Cyan.paint("=== Voting up then down leaves a single -1 vote"));
    let outcome = forum
        .cast_vote(&bob, VoteTarget::Question(q1.id), Direction::Up)
        .await
        .unwrap();
    assert_eq!(outcome.votes, 1);
    let outcome = forum
        .cast_vote(&bob, VoteTarget::Question(q1.id), Direction::Down)
        .await
        .unwrap();
    assert_eq!(outcome.vote, Some(-1));
    assert_eq!(outcome.votes, -1);

    info!("{}", Red.paint("=== Voting on a missing target is not found"));
    let err = forum
        .cast_vote(&bob, VoteTarget::Question(9999), Direction::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{}", err);

    info!("{}", Red.paint("=== Only the question author may accept an answer"));
    let err = forum.accept_answer(&bob, q1.id, a1.id).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)), "{}", err);

    info!("{}", Red.paint("=== Accepting an answer from another question is not found"));
    let a3 = forum
        .create_answer(
            &alice,
            q2.id,
            NewAnswer {
                content: "A LEFT JOIN keeps unmatched left rows.".to_string(),
            },
        )
        .await
        .unwrap();
    let err = forum.accept_answer(&alice, q1.id, a3.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{}", err);

    info!("{}", Cyan.paint("=== Alice accepts the first answer"));
    forum.accept_answer(&alice, q1.id, a1.id).await.unwrap();
    let view = forum.question_view(q1.id, true).await.unwrap();
    let accepted: Vec<u64> = view
        .answers
        .iter()
        .filter(|a| a.is_accepted)
        .map(|a| a.id)
        .collect();
    assert_eq!(accepted, vec![a1.id]);
    assert_eq!(view.answers[0].id, a1.id, "accepted answer sorts first");

    info!("{}", Cyan.paint("=== Accepting the second answer flips exclusivity"));
    forum.accept_answer(&alice, q1.id, a2.id).await.unwrap();
    let view = forum.question_view(q1.id, true).await.unwrap();
    let accepted: Vec<u64> = view
        .answers
        .iter()
        .filter(|a| a.is_accepted)
        .map(|a| a.id)
        .collect();
    assert_eq!(accepted, vec![a2.id]);

    info!("{}", Cyan.paint("=== Top-voted ordering puts the higher score first"));
    let outcome = forum
        .cast_vote(&alice, VoteTarget::Question(q2.id), Direction::Up)
        .await
        .unwrap();
    assert_eq!(outcome.votes, 1);
    let page = forum
        .list_questions(listing(ListFilter::TopVoted, &[], 10))
        .await
        .unwrap();
    assert_eq!(page.questions[0].id, q2.id);

    info!("{}", Cyan.paint("=== A limit of 5 never returns more than 5 items"));
    for i in 0..6 {
        forum
            .create_question(
                &bob,
                NewQuestion {
                    title: format!("Filler question {}", i),
                    description: "padding".to_string(),
                    tags: vec![],
                },
            )
            .await
            .unwrap();
    }
    let page = forum
        .list_questions(listing(ListFilter::Newest, &[], 5))
        .await
        .unwrap();
    assert_eq!(page.questions.len(), 5);
    assert!(page.has_more, "a full page reads as hasMore");

    info!("{}", Red.paint("=== Out-of-range limits are rejected"));
    let err = ListingRequest::parse("newest", vec![], Some(0), None).unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{}", err);
    let err = ListingRequest::parse("newest", vec![], Some(101), None).unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{}", err);
    let err = ListingRequest::parse("newest", vec![], None, Some(-1)).unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{}", err);
    let err = ListingRequest::parse("trending", vec![], None, None).unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{}", err);

    info!("{}", Cyan.paint("=== Only the author may edit or delete"));
    let err = forum
        .update_question(&bob, q1.id, "hijacked", "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)), "{}", err);
    let err = forum.delete_answer(&alice, q1.id, a1.id).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)), "{}", err);

    info!("{}", Cyan.paint("=== Deleting a question removes it and its answers"));
    forum.delete_question(&alice, q1.id).await.unwrap();
    let err = forum.question_view(q1.id, true).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{}", err);
    let err = forum
        .cast_vote(&bob, VoteTarget::Answer(a1.id), Direction::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{}", err);

    info!("{}", Cyan.paint("=== Logout revokes the session"));
    let (token, _) = forum.login("alice", "hunter2-but-longer").await.unwrap();
    forum.authenticate(&token).await.unwrap();
    forum.logout(&token).await.unwrap();
    let err = forum.authenticate(&token).await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)), "{}", err);
}

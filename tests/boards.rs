//! Board, membership, task and user endpoints against a real PostgreSQL.
//!
//! Run with `DATABASE_URL=... cargo test -- --ignored`.

mod common;

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{header, StatusCode};
use actix_web::test;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use boardforge::db::users;
use boardforge::models::NewUser;
use boardforge::AppError;

struct TestUser {
    id: String,
    name: String,
    token: String,
}

async fn sign_up<S, B>(app: &S, prefix: &str) -> TestUser
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let name = common::unique_name(prefix);
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/register")
        .set_json(json!({
            "name": name,
            "email": format!("{}@example.com", name),
            "password": "secret1"
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let profile: Value = test::read_body_json(resp).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/token")
        .set_form([("username", name.as_str()), ("password", "secret1")])
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;

    TestUser {
        id: profile["id"].as_str().unwrap().to_string(),
        name,
        token: body["access_token"].as_str().unwrap().to_string(),
    }
}

fn bearer(user: &TestUser) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", user.token))
}

async fn create_board<S, B>(app: &S, owner: &TestUser, title: &str) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/boards")
        .insert_header(bearer(owner))
        .set_json(json!({"title": title}))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let board: Value = test::read_body_json(resp).await;
    board["id"].as_str().unwrap().to_string()
}

async fn set_role<S, B>(
    app: &S,
    admin: &TestUser,
    board_id: &str,
    member: &TestUser,
    role: &str,
) -> StatusCode
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/boards/{}/members", board_id))
        .insert_header(bearer(admin))
        .set_json(json!({"user_id": member.id, "role": role}))
        .to_request();
    test::call_service(app, req).await.status()
}

fn leave_request(board_id: &str, member: &TestUser) -> actix_http::Request {
    test::TestRequest::delete()
        .uri(&format!("/api/v1/boards/{}/members/{}", board_id, member.id))
        .insert_header(bearer(member))
        .to_request()
}

async fn admin_names<S, B>(app: &S, viewer: &TestUser, board_id: &str) -> Vec<String>
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/boards/{}/members", board_id))
        .insert_header(bearer(viewer))
        .to_request();
    let members: Value = test::read_body_json(test::call_service(app, req).await).await;
    members
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["role"] == "admin")
        .map(|m| m["name"].as_str().unwrap().to_string())
        .collect()
}

#[actix_rt::test]
#[ignore = "requires DATABASE_URL"]
async fn test_board_membership_flow() {
    let db = common::database().await;
    let app = common::init_app(common::pg_auth(&db), Some(db.clone())).await;

    let owner = sign_up(&app, "owner").await;
    let member = sign_up(&app, "member").await;
    let outsider = sign_up(&app, "outsider").await;

    // Create
    let req = test::TestRequest::post()
        .uri("/api/v1/boards")
        .insert_header(bearer(&owner))
        .set_json(json!({"title": "Sprint 1", "description": "First sprint"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let board: Value = test::read_body_json(resp).await;
    let board_id = board["id"].as_str().unwrap().to_string();
    assert_eq!(board["created_by_id"], owner.id.as_str());

    // Outsiders cannot see it
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/boards/{}", board_id))
        .insert_header(bearer(&outsider))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    // Admin adds a member
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/boards/{}/members", board_id))
        .insert_header(bearer(&owner))
        .set_json(json!({"user_id": member.id}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let added: Value = test::read_body_json(resp).await;
    assert_eq!(added["role"], "user");
    assert_eq!(added["name"], member.name.as_str());

    // Members see the board in their list
    let req = test::TestRequest::get()
        .uri("/api/v1/boards")
        .insert_header(bearer(&member))
        .to_request();
    let boards: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert!(boards
        .as_array()
        .unwrap()
        .iter()
        .any(|b| b["id"] == board_id.as_str()));

    // Non-admin members cannot delete or manage members
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/boards/{}", board_id))
        .insert_header(bearer(&member))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/boards/{}/members", board_id))
        .insert_header(bearer(&member))
        .set_json(json!({"user_id": outsider.id}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    // The only admin cannot leave
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/boards/{}/members/{}", board_id, owner.id))
        .insert_header(bearer(&owner))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/boards/{}/members", board_id))
        .insert_header(bearer(&member))
        .to_request();
    let members: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(members.as_array().unwrap().len(), 2);

    // Members may leave on their own
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/boards/{}/members/{}", board_id, member.id))
        .insert_header(bearer(&member))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    // Admin deletes the board
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/boards/{}", board_id))
        .insert_header(bearer(&owner))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/boards/{}", board_id))
        .insert_header(bearer(&owner))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
#[ignore = "requires DATABASE_URL"]
async fn test_task_crud_flow() {
    let db = common::database().await;
    let app = common::init_app(common::pg_auth(&db), Some(db.clone())).await;

    let owner = sign_up(&app, "taskowner").await;
    let outsider = sign_up(&app, "taskoutsider").await;

    let req = test::TestRequest::post()
        .uri("/api/v1/boards")
        .insert_header(bearer(&owner))
        .set_json(json!({"title": "Backlog"}))
        .to_request();
    let board: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let board_id = board["id"].as_str().unwrap().to_string();

    // Create
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/boards/{}/tasks", board_id))
        .insert_header(bearer(&owner))
        .set_json(json!({
            "title": "Write 100% of the docs",
            "priority": "high",
            "assigned_to_id": owner.id
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    assert_eq!(
        status,
        StatusCode::CREATED,
        "Task creation failed. Body: {:?}",
        String::from_utf8_lossy(&body)
    );
    let task: Value = serde_json::from_slice(&body).unwrap();
    let task_id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["status"], "todo");
    assert_eq!(task["priority"], "high");
    assert_eq!(task["board_id"], board_id.as_str());

    // Assignees must be members
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/boards/{}/tasks", board_id))
        .insert_header(bearer(&owner))
        .set_json(json!({"title": "Delegated", "assigned_to_id": outsider.id}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    // Validation
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/boards/{}/tasks", board_id))
        .insert_header(bearer(&owner))
        .set_json(json!({"title": ""}))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );

    // Filters; `%` is matched literally
    for (query, expected) in [
        ("status=todo", 1),
        ("status=done", 0),
        ("priority=high", 1),
        ("search=100%25", 1),
        ("search=10%25%25", 0),
        ("search=DOCS", 1),
    ] {
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/boards/{}/tasks?{}", board_id, query))
            .insert_header(bearer(&owner))
            .to_request();
        let tasks: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(tasks.as_array().unwrap().len(), expected, "query {}", query);
    }

    // Outsiders see nothing
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/tasks/{}", task_id))
        .insert_header(bearer(&outsider))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    // Update
    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/tasks/{}", task_id))
        .insert_header(bearer(&owner))
        .set_json(json!({"title": "Docs written", "status": "done"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["title"], "Docs written");
    assert_eq!(updated["status"], "done");
    assert_eq!(updated["assigned_to_id"], Value::Null);

    // Delete
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/tasks/{}", task_id))
        .insert_header(bearer(&owner))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/tasks/{}", task_id))
        .insert_header(bearer(&owner))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
#[ignore = "requires DATABASE_URL"]
async fn test_user_endpoints() {
    let db = common::database().await;
    let app = common::init_app(common::pg_auth(&db), Some(db.clone())).await;

    let alice = sign_up(&app, "alice").await;
    let bob = sign_up(&app, "bob").await;

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/users/{}", bob.id))
        .insert_header(bearer(&alice))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let profile: Value = test::read_body_json(resp).await;
    assert_eq!(profile["name"], bob.name.as_str());
    assert!(profile.get("password_hash").is_none());

    // Only yourself
    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/users/{}", bob.id))
        .insert_header(bearer(&alice))
        .set_json(json!({"name": "hijacked"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    // Taking someone else's name
    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/users/{}", alice.id))
        .insert_header(bearer(&alice))
        .set_json(json!({"name": bob.name}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "the username is already taken");

    // Password change takes effect on the next login
    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/users/{}", alice.id))
        .insert_header(bearer(&alice))
        .set_json(json!({"password": "another-secret"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/token")
        .set_form([("username", alice.name.as_str()), ("password", "another-secret")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    // Delete self
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/users/{}", alice.id))
        .insert_header(bearer(&alice))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    // The token still verifies, but its subject is gone
    let req = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer(&alice))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_registration_with_same_email() {
    let db = common::database().await;
    let auth = common::pg_auth(&db);
    let email = format!("{}@example.com", common::unique_name("race"));

    let first = boardforge::auth::RegisterRequest {
        name: common::unique_name("racer"),
        email: email.clone(),
        password: "secret1".into(),
    };
    let second = boardforge::auth::RegisterRequest {
        name: common::unique_name("racer"),
        email,
        password: "secret1".into(),
    };

    let (a, b) = futures::join!(auth.register(first), auth.register(second));
    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let err = outcomes.into_iter().find_map(Result::err).unwrap();
    assert!(
        matches!(
            err,
            boardforge::error::AppError::DuplicateCredential(ref fields)
                if fields == &[boardforge::error::CredentialField::Email]
        ),
        "unexpected error: {:?}",
        err
    );
}

#[actix_rt::test]
#[ignore = "requires DATABASE_URL"]
async fn test_sole_admin_cannot_demote_themselves() {
    let db = common::database().await;
    let app = common::init_app(common::pg_auth(&db), Some(db.clone())).await;

    let owner = sign_up(&app, "demoter").await;
    let other = sign_up(&app, "demotee").await;
    let board_id = create_board(&app, &owner, "Demotions").await;

    assert_eq!(
        set_role(&app, &owner, &board_id, &owner, "user").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(admin_names(&app, &owner, &board_id).await, vec![owner.name.clone()]);

    // With a second admin in place the demotion goes through
    assert_eq!(set_role(&app, &owner, &board_id, &other, "admin").await, StatusCode::OK);
    assert_eq!(set_role(&app, &owner, &board_id, &owner, "user").await, StatusCode::OK);
    assert_eq!(admin_names(&app, &other, &board_id).await, vec![other.name.clone()]);
}

#[actix_rt::test]
#[ignore = "requires DATABASE_URL"]
async fn test_sole_admin_account_deletion_is_refused() {
    let db = common::database().await;
    let app = common::init_app(common::pg_auth(&db), Some(db.clone())).await;

    let creator = sign_up(&app, "creator").await;
    let heir = sign_up(&app, "heir").await;
    let member = sign_up(&app, "bystander").await;
    let board_id = create_board(&app, &creator, "Inherited").await;

    assert_eq!(set_role(&app, &creator, &board_id, &heir, "admin").await, StatusCode::OK);
    assert_eq!(set_role(&app, &creator, &board_id, &member, "user").await, StatusCode::OK);
    let resp = test::call_service(&app, leave_request(&board_id, &creator)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // `heir` is now the only admin of a board they did not create
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/users/{}", heir.id))
        .insert_header(bearer(&heir))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(admin_names(&app, &member, &board_id).await, vec![heir.name.clone()]);

    // After handing over, deletion succeeds and the board keeps an admin
    assert_eq!(set_role(&app, &heir, &board_id, &member, "admin").await, StatusCode::OK);
    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/users/{}", heir.id))
        .insert_header(bearer(&heir))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(admin_names(&app, &member, &board_id).await, vec![member.name.clone()]);
}

#[actix_rt::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_admin_departures_keep_one_admin() {
    let db = common::database().await;
    let app = common::init_app(common::pg_auth(&db), Some(db.clone())).await;

    let first = sign_up(&app, "admin_one").await;
    let second = sign_up(&app, "admin_two").await;

    for round in 0..5 {
        let board_id = create_board(&app, &first, &format!("Race {}", round)).await;
        assert_eq!(set_role(&app, &first, &board_id, &second, "admin").await, StatusCode::OK);

        let (a, b) = futures::join!(
            test::call_service(&app, leave_request(&board_id, &first)),
            test::call_service(&app, leave_request(&board_id, &second)),
        );
        let mut statuses = [a.status(), b.status()];
        statuses.sort();
        assert_eq!(
            statuses,
            [StatusCode::NO_CONTENT, StatusCode::BAD_REQUEST],
            "round {}",
            round
        );

        let remaining = if a.status() == StatusCode::NO_CONTENT { &second } else { &first };
        assert_eq!(
            admin_names(&app, remaining, &board_id).await,
            vec![remaining.name.clone()]
        );
    }
}

#[actix_rt::test]
#[ignore = "requires DATABASE_URL"]
async fn test_leaving_a_board_unassigns_tasks() {
    let db = common::database().await;
    let app = common::init_app(common::pg_auth(&db), Some(db.clone())).await;

    let owner = sign_up(&app, "assigner").await;
    let member = sign_up(&app, "assignee").await;
    let board_id = create_board(&app, &owner, "Assignments").await;
    assert_eq!(set_role(&app, &owner, &board_id, &member, "user").await, StatusCode::OK);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/boards/{}/tasks", board_id))
        .insert_header(bearer(&owner))
        .set_json(json!({"title": "Handed out", "assigned_to_id": member.id}))
        .to_request();
    let task: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(task["assigned_to_id"], member.id.as_str());
    let task_id = task["id"].as_str().unwrap().to_string();

    let resp = test::call_service(&app, leave_request(&board_id, &member)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/tasks/{}", task_id))
        .insert_header(bearer(&owner))
        .to_request();
    let task: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(task["assigned_to_id"], Value::Null);
}

fn scratch_user() -> NewUser {
    let name = common::unique_name("scoped");
    NewUser {
        email: format!("{}@example.com", name),
        name,
        password_hash: "not-a-real-digest".into(),
    }
}

#[actix_rt::test]
#[ignore = "requires DATABASE_URL"]
async fn test_scope_rolls_back_on_error() {
    let db = common::database().await;
    let user = scratch_user();
    let name = user.name.clone();

    let outcome = db
        .scope(move |session| {
            Box::pin(async move {
                users::insert(session, &user).await?;
                Err::<(), _>(AppError::BadRequest("abandoned".into()))
            })
        })
        .await;
    assert!(matches!(outcome, Err(AppError::BadRequest(_))), "{:?}", outcome);

    let found = db
        .scope(move |session| Box::pin(async move { users::find_by_name(session, &name).await }))
        .await
        .unwrap();
    assert!(found.is_none());
}

#[actix_rt::test]
#[ignore = "requires DATABASE_URL"]
async fn test_scope_commits_on_success() {
    let db = common::database().await;
    let user = scratch_user();
    let name = user.name.clone();

    let inserted = db
        .scope(move |session| Box::pin(async move { users::insert(session, &user).await }))
        .await
        .unwrap();

    let found = db
        .scope(move |session| Box::pin(async move { users::find_by_name(session, &name).await }))
        .await
        .unwrap();
    assert_eq!(found.map(|u| u.id), Some(inserted.id));
}

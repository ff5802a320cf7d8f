mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use huddle_server::error::ChatError;
use huddle_server::models::RoomType;
use huddle_server::routes;
use serde_json::{json, Value};
use std::collections::BTreeSet;

fn auth_header(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        format!("Bearer {}", token).parse().unwrap(),
    )
}

fn set<S: AsRef<str>>(ids: &[S]) -> BTreeSet<String> {
    ids.iter().map(|s| s.as_ref().to_string()).collect()
}

#[tokio::test]
async fn test_non_admin_cannot_remove_members() {
    let pool = common::setup_test_db().await;
    let (state, _) = common::create_test_state(pool);
    let room = common::create_group_room(&state, "Team", "a", &["b", "c"]).await;

    let err = state
        .memberships
        .remove_members(&room, "b", &["c".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Forbidden(_)));

    let members = state.memberships.members_of(&room).await.unwrap();
    assert_eq!(members, set(&["a", "b", "c"]));
}

#[tokio::test]
async fn test_admin_removes_member() {
    let pool = common::setup_test_db().await;
    let (state, _) = common::create_test_state(pool);
    let room = common::create_group_room(&state, "Team", "a", &["b", "c"]).await;

    let membership = state
        .memberships
        .remove_members(&room, "a", &["b".to_string()])
        .await
        .unwrap();
    assert_eq!(membership.members, set(&["a", "c"]));
}

#[tokio::test]
async fn test_admin_cannot_remove_self() {
    let pool = common::setup_test_db().await;
    let (state, _) = common::create_test_state(pool);
    let room = common::create_group_room(&state, "Team", "a", &["b"]).await;

    let err = state
        .memberships
        .remove_members(&room, "a", &["a".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::InvalidArgument(_)));
    assert!(state.memberships.is_member(&room, "a").await.unwrap());
}

#[tokio::test]
async fn test_transfer_admin_keeps_old_admin_as_member() {
    let pool = common::setup_test_db().await;
    let (state, _) = common::create_test_state(pool);
    let room = common::create_group_room(&state, "Team", "a", &["b", "c"]).await;

    let membership = state.memberships.transfer_admin(&room, "a", "b").await.unwrap();
    assert_eq!(membership.admin, "b");
    assert!(membership.contains("a"));

    // The old admin has lost admin rights.
    let err = state
        .memberships
        .remove_members(&room, "a", &["c".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Forbidden(_)));
}

#[tokio::test]
async fn test_transfer_admin_validation() {
    let pool = common::setup_test_db().await;
    let (state, _) = common::create_test_state(pool);
    let room = common::create_group_room(&state, "Team", "a", &["b"]).await;

    let err = state.memberships.transfer_admin(&room, "b", "b").await.unwrap_err();
    assert!(matches!(err, ChatError::Forbidden(_)));

    let err = state
        .memberships
        .transfer_admin(&room, "a", "stranger")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::InvalidArgument(_)));

    let err = state
        .memberships
        .transfer_admin("missing", "a", "b")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));
}

#[tokio::test]
async fn test_concurrent_transfers_only_one_wins() {
    let pool = common::setup_test_db().await;
    let (state, _) = common::create_test_state(pool);
    let room = common::create_group_room(&state, "Team", "a", &["b", "c"]).await;

    let first = {
        let memberships = state.memberships.clone();
        let room = room.clone();
        tokio::spawn(async move { memberships.transfer_admin(&room, "a", "b").await })
    };
    let second = {
        let memberships = state.memberships.clone();
        let room = room.clone();
        tokio::spawn(async move { memberships.transfer_admin(&room, "a", "c").await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);

    let admin = state.memberships.membership(&room).await.unwrap().admin;
    assert!(admin == "b" || admin == "c");
}

#[tokio::test]
async fn test_add_members_is_idempotent() {
    let pool = common::setup_test_db().await;
    let (state, _) = common::create_test_state(pool);
    let room = common::create_group_room(&state, "Team", "a", &[]).await;

    let once = state
        .memberships
        .add_members(&room, &["u".to_string()])
        .await
        .unwrap();
    let twice = state
        .memberships
        .add_members(&room, &["u".to_string()])
        .await
        .unwrap();
    assert_eq!(once.members, twice.members);
    assert_eq!(twice.members, set(&["a", "u"]));

    let err = state
        .memberships
        .add_members("missing", &["u".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));
}

#[tokio::test]
async fn test_create_membership_rules() {
    let pool = common::setup_test_db().await;
    let (state, _) = common::create_test_state(pool);

    let err = state
        .memberships
        .create_membership("r1", "Team", &["b".to_string()], RoomType::Group, "a")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::InvalidArgument(_)));

    let err = state
        .memberships
        .create_membership(
            "r2",
            "",
            &["a".to_string(), "b".to_string(), "c".to_string()],
            RoomType::Direct,
            "a",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::InvalidArgument(_)));

    let direct = state
        .memberships
        .create_membership("r3", "", &["a".to_string(), "b".to_string()], RoomType::Direct, "a")
        .await
        .unwrap();
    assert_eq!(direct.room_type, RoomType::Direct);

    let err = state
        .memberships
        .add_members("r3", &["c".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_rooms_of_filters_by_type() {
    let pool = common::setup_test_db().await;
    let (state, _) = common::create_test_state(pool);
    let group = common::create_group_room(&state, "Team", "a", &["b"]).await;
    state
        .memberships
        .create_membership("dm", "", &["a".to_string(), "c".to_string()], RoomType::Direct, "a")
        .await
        .unwrap();

    let all = state.memberships.rooms_of("a", None).await.unwrap();
    assert_eq!(all.len(), 2);

    let groups = state
        .memberships
        .rooms_of("a", Some(RoomType::Group))
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].room_id, group);

    assert!(state.memberships.rooms_of("b", Some(RoomType::Direct)).await.unwrap().is_empty());
}

// ── REST surface ──

#[tokio::test]
async fn test_create_and_list_rooms_over_http() {
    let pool = common::setup_test_db().await;
    let server = TestServer::new(common::create_test_app(pool.clone())).unwrap();
    let (alice, token) = common::create_test_user(&pool, "alice@test.com", "alice").await;
    let (bob, _) = common::create_test_user(&pool, "bob@test.com", "bob").await;

    let (name, value) = auth_header(&token);
    let res = server
        .post("/api/rooms")
        .add_header(name.clone(), value.clone())
        .json(&json!({"roomType": "GROUP", "members": [bob]}))
        .await;
    res.assert_status(StatusCode::CREATED);
    let room: Value = res.json();
    assert_eq!(room["name"], "Chat room");
    assert_eq!(room["admin"], alice);
    assert_eq!(room["members"].as_array().unwrap().len(), 2);

    let res = server
        .get("/api/rooms?type=GROUP")
        .add_header(name.clone(), value.clone())
        .await;
    res.assert_status_ok();
    let rooms: Value = res.json();
    assert_eq!(rooms.as_array().unwrap().len(), 1);

    let res = server
        .get("/api/rooms?type=DIRECT")
        .add_header(name, value)
        .await;
    let rooms: Value = res.json();
    assert!(rooms.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let pool = common::setup_test_db().await;
    let server = TestServer::new(common::create_test_app(pool)).unwrap();

    let res = server.get("/api/rooms").await;
    res.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = res.json();
    assert_eq!(body["code"], "AUTHENTICATION_FAILED");
}

#[tokio::test]
async fn test_expired_session_is_rejected() {
    let pool = common::setup_test_db().await;
    let server = TestServer::new(common::create_test_app(pool.clone())).unwrap();
    let (user_id, _) = common::create_test_user(&pool, "old@test.com", "old").await;
    let expired = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    common::insert_session(&pool, &user_id, "stale-token", &expired).await;

    let (name, value) = auth_header("stale-token");
    let res = server.get("/api/rooms").add_header(name, value).await;
    res.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let pool = common::setup_test_db().await;
    let server = TestServer::new(common::create_test_app(pool.clone())).unwrap();
    let (_, token) = common::create_test_user(&pool, "c@test.com", "cookie").await;

    let res = server
        .get("/api/rooms")
        .add_header(
            HeaderName::from_static("cookie"),
            format!("huddle.session_token={}", token).parse::<HeaderValue>().unwrap(),
        )
        .await;
    res.assert_status_ok();
}

#[tokio::test]
async fn test_member_routes_enforce_roles() {
    let pool = common::setup_test_db().await;
    let (state, _) = common::create_test_state(pool.clone());
    let server = TestServer::new(routes::build_router(state.clone())).unwrap();

    let (alice, alice_token) = common::create_test_user(&pool, "alice@test.com", "alice").await;
    let (bob, bob_token) = common::create_test_user(&pool, "bob@test.com", "bob").await;
    let (_, eve_token) = common::create_test_user(&pool, "eve@test.com", "eve").await;
    let room = common::create_group_room(&state, "Team", &alice, &[&bob]).await;

    // Outsiders cannot see the member list.
    let (name, value) = auth_header(&eve_token);
    server
        .get(&format!("/api/rooms/{}/members", room))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // Bob is not the admin.
    let (name, value) = auth_header(&bob_token);
    let res = server
        .delete(&format!("/api/rooms/{}/members", room))
        .add_header(name, value)
        .json(&json!({"userIds": [alice]}))
        .await;
    res.assert_status(StatusCode::FORBIDDEN);
    let body: Value = res.json();
    assert_eq!(body["code"], "FORBIDDEN");

    // Alice hands the room to Bob.
    let (name, value) = auth_header(&alice_token);
    let res = server
        .put(&format!("/api/rooms/{}/admin", room))
        .add_header(name, value)
        .json(&json!({"userId": bob}))
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["admin"], bob);

    let (name, value) = auth_header(&alice_token);
    server
        .get("/api/rooms/does-not-exist/members")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

//! E2E tests for follows and profiles

mod common;

use common::TestServer;
use serde_json::json;

#[tokio::test]
async fn test_follow_and_unfollow() {
    let server = TestServer::new().await;
    let alice = server.signup("alice").await;
    server.signup("bob").await;

    let (status, body) = server.post_empty("/follow/bob", &alice).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "You are following bob!");

    let (_, profile) = server.get_json("/user/bob", &alice).await;
    assert_eq!(profile["is_following"], true);
    assert_eq!(profile["followers_count"], 1);
    assert_eq!(profile["following_count"], 0);

    // Following twice changes nothing
    let (status, _) = server.post_empty("/follow/bob", &alice).await;
    assert_eq!(status, 200);
    let (_, profile) = server.get_json("/user/bob", &alice).await;
    assert_eq!(profile["followers_count"], 1);

    let (status, _) = server.post_empty("/unfollow/bob", &alice).await;
    assert_eq!(status, 200);
    let (_, profile) = server.get_json("/user/bob", &alice).await;
    assert_eq!(profile["is_following"], false);
    assert_eq!(profile["followers_count"], 0);
}

#[tokio::test]
async fn test_self_follow_is_rejected() {
    let server = TestServer::new().await;
    let alice = server.signup("alice").await;

    let (status, body) = server.post_empty("/follow/alice", &alice).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "You cannot follow yourself");

    let (status, body) = server.post_empty("/unfollow/alice", &alice).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "You cannot unfollow yourself");

    let (_, profile) = server.get_json("/user/alice", &alice).await;
    assert_eq!(profile["following_count"], 0);
}

#[tokio::test]
async fn test_unknown_user_is_404() {
    let server = TestServer::new().await;
    let alice = server.signup("alice").await;

    let (status, _) = server.post_empty("/follow/nobody", &alice).await;
    assert_eq!(status, 404);
    let (status, _) = server.post_empty("/unfollow/nobody", &alice).await;
    assert_eq!(status, 404);
    let (status, _) = server.get_json("/user/nobody", &alice).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_follow_requires_login() {
    let server = TestServer::new().await;
    server.register("bob").await;

    let response = server
        .client
        .post(server.url("/follow/bob"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(
        response.headers()["location"],
        "/login?next=%2Ffollow%2Fbob"
    );
}

#[tokio::test]
async fn test_edit_profile() {
    let server = TestServer::new().await;
    let alice = server.signup("alice").await;
    server.signup("bob").await;

    let (status, user) = server
        .post_json(
            "/edit_profile",
            &alice,
            json!({ "username": "alicia", "about_me": "I post things" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(user["username"], "alicia");
    assert_eq!(user["about_me"], "I post things");

    let (status, form) = server.get_json("/edit_profile", &alice).await;
    assert_eq!(status, 200);
    assert_eq!(form["username"], "alicia");

    let (status, body) = server
        .post_json("/edit_profile", &alice, json!({ "username": "bob" }))
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["fields"][0]["field"], "username");

    let (status, _) = server
        .post_json(
            "/edit_profile",
            &alice,
            json!({ "username": "alicia", "about_me": "x".repeat(141) }),
        )
        .await;
    assert_eq!(status, 400);

    let (_, profile) = server.get_json("/user/alicia", &alice).await;
    assert_eq!(profile["user"]["about_me"], "I post things");
}

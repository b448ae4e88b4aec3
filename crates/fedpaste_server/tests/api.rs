//! Integration tests for the peer HTTP API.

mod support;

use axum::http::StatusCode;
use fedpaste_server::models::paste::Paste;
use serde_json::json;
use support::{setup_test_server, ADMIN_PASSWORD};

fn location(response: &axum_test::TestResponse) -> String {
    response
        .header("location")
        .to_str()
        .expect("ascii location")
        .to_string()
}

#[tokio::test]
async fn raw_returns_plain_text_with_dates() {
    let (server, state, _temp) = setup_test_server().await;
    state
        .db
        .pastes
        .create(Paste::new("demo", "hello peers", "secret1"), false)
        .await
        .expect("create");
    let stored = state
        .db
        .pastes
        .get("demo")
        .await
        .expect("get")
        .expect("exists");

    let response = server.get("/api/raw/demo").await;
    response.assert_status_ok();
    response.assert_text("hello peers");
    response.assert_header("content-type", "text/plain; charset=utf-8");
    response.assert_header(
        "x-paste-pubdate",
        stored.pub_date.timestamp_millis().to_string(),
    );
    response.assert_header("x-content-type-options", "nosniff");
}

#[tokio::test]
async fn raw_hides_missing_remote_and_private_pastes() {
    let (server, state, _temp) = setup_test_server().await;
    let private = Paste {
        view_password: "viewpw1".to_string(),
        ..Paste::new("hidden", "secret", "secret1")
    };
    state.db.pastes.create(private, false).await.expect("create");

    server
        .get("/api/raw/ghost")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get("/api/raw/demo:elsewhere.example")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let response = server.get("/api/raw/hidden").await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "paste 'hidden' is private");
}

#[tokio::test]
async fn edit_form_redirects_to_the_new_url() {
    let (server, state, _temp) = setup_test_server().await;
    state
        .db
        .pastes
        .create(Paste::new("demo", "v1", "secret1"), false)
        .await
        .expect("create");

    let response = server
        .post("/api/edit")
        .form(&json!({
            "OldURL": "demo",
            "OldEditPassword": "secret1",
            "OldContent": "v1",
            "NewURL": "renamed",
            "NewEditPassword": "",
            "NewContent": "v2",
        }))
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/renamed");

    let paste = state
        .db
        .pastes
        .get("renamed")
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(paste.content, "v2");
}

#[tokio::test]
async fn edit_form_reports_rejections_in_the_redirect() {
    let (server, state, _temp) = setup_test_server().await;
    state
        .db
        .pastes
        .create(Paste::new("demo", "v1", "secret1"), false)
        .await
        .expect("create");

    let response = server
        .post("/api/edit")
        .form(&json!({
            "OldURL": "demo",
            "OldEditPassword": "wrong-pw",
            "NewURL": "demo",
            "NewContent": "v2",
        }))
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.starts_with("/demo?err="), "{}", target);

    let paste = state.db.pastes.get("demo").await.expect("get").expect("exists");
    assert_eq!(paste.content, "v1");
}

#[tokio::test]
async fn edit_form_refuses_to_forward_again() {
    let (server, _state, _temp) = setup_test_server().await;
    let response = server
        .post("/api/edit")
        .form(&json!({
            "OldURL": "demo:elsewhere.example",
            "OldEditPassword": "secret1",
            "NewURL": "demo",
            "NewContent": "v2",
        }))
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert!(location(&response).contains("err="));
}

#[tokio::test]
async fn delete_form_redirects_home_or_back_with_error() {
    let (server, state, _temp) = setup_test_server().await;
    state
        .db
        .pastes
        .create(Paste::new("demo", "bye", "secret1"), false)
        .await
        .expect("create");

    let rejected = server
        .post("/api/delete")
        .form(&json!({ "CustomURL": "demo", "password": "nope-nope" }))
        .await;
    rejected.assert_status(StatusCode::SEE_OTHER);
    assert!(location(&rejected).starts_with("/demo?err="));

    let accepted = server
        .post("/api/delete")
        .form(&json!({ "CustomURL": "demo", "password": ADMIN_PASSWORD }))
        .await;
    accepted.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&accepted), "/");
    assert!(state.db.pastes.get("demo").await.expect("get").is_none());
}

#[tokio::test]
async fn group_listing_returns_scrubbed_public_members() {
    let (server, state, _temp) = setup_test_server().await;
    for (url, view_password) in [("alpha", ""), ("beta", "viewpw1")] {
        let draft = Paste {
            group_name: "sprint1".to_string(),
            group_submit_password: "grp1".to_string(),
            view_password: view_password.to_string(),
            ..Paste::new(url, "member", "secret1")
        };
        state.db.pastes.create(draft, false).await.expect("create");
    }

    let response = server.get("/api/group/sprint1").await;
    response.assert_status_ok();
    let members: Vec<Paste> = response.json();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].custom_url, "sprint1/alpha");
    assert!(members[0].edit_password.is_empty());
    assert!(members[0].group_submit_password.is_empty());
}

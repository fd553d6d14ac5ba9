mod common;

use anyhow::Result;
use reqwest::StatusCode;
use uuid::Uuid;

use common::TestServer;
use fieldops_api::auth::Role;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = TestServer::spawn().await?;
    let res = reqwest::get(server.url("/health")).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true, "{}", body);
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let server = TestServer::spawn().await?;
    let res = reqwest::get(server.url(&format!("/masons/{}", Uuid::new_v4()))).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(common::error_code(&body), "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn tokens_signed_with_another_secret_are_rejected() -> Result<()> {
    let server = TestServer::spawn().await?;
    let claims = fieldops_api::auth::Claims::new(Uuid::new_v4(), "intruder", Role::Admin, 1);
    let forged = fieldops_api::auth::generate_jwt(&claims, "not-the-secret")?;

    let (status, _) = server.get(&format!("/masons/{}", Uuid::new_v4()), &forged).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn masons_only_see_their_own_account() -> Result<()> {
    let server = TestServer::spawn().await?;
    let alice = server.seed_mason("Alice").await?;
    let bob = server.seed_mason("Bob").await?;
    let token = server.token(alice.id, Role::Mason);

    let (status, body) = server.get(&format!("/masons/{}", alice.id), &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(common::data(&body)["name"], "Alice");

    let (status, body) = server.get(&format!("/masons/{}", bob.id), &token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(common::error_code(&body), "FORBIDDEN");
    Ok(())
}

#[tokio::test]
async fn only_approvers_may_transition_records() -> Result<()> {
    let server = TestServer::spawn().await?;
    let mason = server.seed_mason("Ravi").await?;
    let token = server.token(mason.id, Role::Mason);

    let (status, body) = server
        .post("/bag-lifts", &token, serde_json::json!({"masonId": mason.id, "bagCount": 3}))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let lift_id = common::data(&body)["id"].as_str().unwrap_or_default().to_string();

    let (status, _) = server
        .patch(&format!("/bag-lifts/{}", lift_id), &token, serde_json::json!({"status": "approved"}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

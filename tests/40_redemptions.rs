mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::{data, error_code, TestServer};

#[tokio::test]
async fn approve_takes_stock_and_reject_restores_it() -> Result<()> {
    let server = TestServer::spawn().await?;
    let approver = server.approver();
    let mason = server.seed_mason("Shankar").await?;
    let reward = server.seed_reward("Toolkit", 100, 5).await?;
    server.credit(mason.id, 300).await?;

    let (status, body) = server
        .post(
            "/rewards-redemption",
            &approver,
            json!({"masonId": mason.id, "rewardId": reward.id, "quantity": 2}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(data(&body)["pointsDebited"], 200);
    let path = format!("/rewards-redemption/{}", data(&body)["id"].as_str().unwrap_or_default());

    let (_, body) = server.get(&format!("/masons/{}", mason.id), &approver).await?;
    assert_eq!(data(&body)["pointsBalance"], 100);

    let (status, _) = server.patch(&path, &approver, json!({"status": "approved"})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.stock(reward.id).await?, 3);

    let (status, body) = server.patch(&path, &approver, json!({"status": "rejected"})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(server.stock(reward.id).await?, 5);

    let (_, body) = server.get(&format!("/masons/{}", mason.id), &approver).await?;
    assert_eq!(data(&body)["pointsBalance"], 300);
    Ok(())
}

#[tokio::test]
async fn fulfillment_runs_forward_only() -> Result<()> {
    let server = TestServer::spawn().await?;
    let approver = server.approver();
    let mason = server.seed_mason("Prakash").await?;
    let reward = server.seed_reward("Helmet", 50, 10).await?;
    server.credit(mason.id, 50).await?;

    let (_, body) = server
        .post(
            "/rewards-redemption",
            &approver,
            json!({"masonId": mason.id, "rewardId": reward.id, "quantity": 1}),
        )
        .await?;
    let path = format!("/rewards-redemption/{}", data(&body)["id"].as_str().unwrap_or_default());

    for status in ["approved", "shipped", "delivered"] {
        let (code, body) = server.patch(&path, &approver, json!({"status": status})).await?;
        assert_eq!(code, StatusCode::OK, "{} -> {}", status, body);
    }

    let (code, body) = server.patch(&path, &approver, json!({"status": "rejected"})).await?;
    assert_eq!(code, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CONFLICT");

    let (code, _) = server.patch(&path, &approver, json!({"status": "placed"})).await?;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn short_balance_or_stock_is_unprocessable() -> Result<()> {
    let server = TestServer::spawn().await?;
    let approver = server.approver();
    let mason = server.seed_mason("Nagesh").await?;
    let scarce = server.seed_reward("Drill", 10, 1).await?;
    server.credit(mason.id, 40).await?;

    let (status, body) = server
        .post(
            "/rewards-redemption",
            &approver,
            json!({"masonId": mason.id, "rewardId": scarce.id, "quantity": 5}),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "INSUFFICIENT_RESOURCE");

    let (_, body) = server
        .post(
            "/rewards-redemption",
            &approver,
            json!({"masonId": mason.id, "rewardId": scarce.id, "quantity": 2}),
        )
        .await?;
    let path = format!("/rewards-redemption/{}", data(&body)["id"].as_str().unwrap_or_default());

    let (status, body) = server.patch(&path, &approver, json!({"status": "approved"})).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "INSUFFICIENT_RESOURCE");
    assert_eq!(server.stock(scarce.id).await?, 1);

    let (_, body) = server.get(&path, &approver).await?;
    assert_eq!(data(&body)["status"], "placed");
    Ok(())
}

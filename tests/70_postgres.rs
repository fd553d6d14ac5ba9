//! Runs the money and sync paths against a real Postgres. Skipped unless
//! `DATABASE_URL` points at a database the suite may migrate and write to.

mod common;

use std::sync::Arc;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{data, error_code, TestServer};
use fieldops_api::auth::Role;
use fieldops_api::config::AppConfig;
use fieldops_api::database::models::Mason;
use fieldops_api::database::DatabaseManager;
use fieldops_api::services::LedgerService;
use fieldops_api::store::PgStore;

async fn pg_server() -> Result<Option<TestServer>> {
    dotenvy::dotenv().ok();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping Postgres test");
        return Ok(None);
    };

    let mut config = AppConfig::development();
    config.database.url = Some(url);
    config.database.max_connections = 5;

    let pool = DatabaseManager::connect(&config.database).await?;
    DatabaseManager::migrate(&pool).await?;
    let server = TestServer::spawn_on(Arc::new(PgStore::new(pool)), config).await?;
    Ok(Some(server))
}

async fn claim(server: &TestServer, token: &str, mason: &Mason, bags: i64) -> Result<String> {
    let (status, body) = server
        .post("/bag-lifts", token, json!({"masonId": mason.id, "bagCount": bags}))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    Ok(data(&body)["id"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn postgres_approve_reject_and_reapprove_with_referral() -> Result<()> {
    let Some(server) = pg_server().await? else {
        return Ok(());
    };
    let approver = server.approver();
    let referrer = server.seed_mason("Anil").await?;
    let referee = server.insert_mason(Mason::new("Deepak").referred_by(referrer.id)).await?;

    let first = claim(&server, &approver, &referee, 200).await?;
    let path = format!("/bag-lifts/{}", first);
    let (status, body) = server.patch(&path, &approver, json!({"status": "approved"})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let (status, body) = server.patch(&path, &approver, json!({"status": "rejected"})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, _) = server.patch(&path, &approver, json!({"status": "rejected"})).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let second = claim(&server, &approver, &referee, 200).await?;
    let (status, body) = server
        .patch(&format!("/bag-lifts/{}", second), &approver, json!({"status": "approved"}))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, body) = server.get(&format!("/masons/{}", referrer.id), &approver).await?;
    assert_eq!(data(&body)["pointsBalance"], 1000);
    let (_, body) = server.get(&format!("/masons/{}", referee.id), &approver).await?;
    assert_eq!(data(&body)["bagsLifted"], 200);
    assert_eq!(data(&body)["pointsBalance"], 3000);

    let ledger = LedgerService::new(server.store.clone(), Default::default());
    for id in [referrer.id, referee.id] {
        let report = ledger.reconcile(id).await?.expect("mason exists");
        assert!(!report.corrected, "{:?}", report);
    }
    Ok(())
}

#[tokio::test]
async fn postgres_stock_shortfall_rolls_back() -> Result<()> {
    let Some(server) = pg_server().await? else {
        return Ok(());
    };
    let approver = server.approver();
    let mason = server.seed_mason("Nagesh").await?;
    let scarce = server.seed_reward("Drill", 10, 1).await?;
    server.credit(mason.id, 40).await?;

    let (status, body) = server
        .post(
            "/rewards-redemption",
            &approver,
            json!({"masonId": mason.id, "rewardId": scarce.id, "quantity": 2}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let path = format!("/rewards-redemption/{}", data(&body)["id"].as_str().unwrap_or_default());

    let (status, body) = server.patch(&path, &approver, json!({"status": "approved"})).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "INSUFFICIENT_RESOURCE");
    assert_eq!(server.stock(scarce.id).await?, 1);

    let (_, body) = server.get(&path, &approver).await?;
    assert_eq!(data(&body)["status"], "placed");
    let (_, body) = server.get(&format!("/masons/{}", mason.id), &approver).await?;
    assert_eq!(data(&body)["pointsBalance"], 20);
    Ok(())
}

#[tokio::test]
async fn postgres_duplicate_op_and_second_start() -> Result<()> {
    let Some(server) = pg_server().await? else {
        return Ok(());
    };
    let token = server.token(Uuid::new_v4(), Role::Field);
    let journey = Uuid::new_v4();
    let start = json!({
        "opId": Uuid::new_v4(),
        "journeyId": journey,
        "type": "START",
        "payload": {"destinationAddress": "Site 14"},
        "localSeq": 1
    });

    let (status, first) = server.post("/journey-ops/sync", &token, json!({"ops": [start.clone()]})).await?;
    assert_eq!(status, StatusCode::OK, "{}", first);
    assert_eq!(data(&first)["acks"][0]["status"], "OK");

    let (_, second) = server.post("/journey-ops/sync", &token, json!({"ops": [start]})).await?;
    assert_eq!(data(&second)["acks"][0]["status"], "ALREADY_PROCESSED");
    assert_eq!(data(&first)["acks"][0]["serverSeq"], data(&second)["acks"][0]["serverSeq"]);

    let restart = json!({"opId": Uuid::new_v4(), "journeyId": journey, "type": "START", "payload": {}});
    let (_, third) = server.post("/journey-ops/sync", &token, json!({"ops": [restart]})).await?;
    assert_eq!(data(&third)["acks"][0]["status"], "FAILED");

    let (_, pulled) = server.get("/journey-ops?after=0", &token).await?;
    assert_eq!(data(&pulled).as_array().map(Vec::len), Some(1));
    Ok(())
}

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{data, error_code, TestServer};
use fieldops_api::auth::Role;

fn start(journey_id: Uuid) -> Value {
    json!({
        "opId": Uuid::new_v4(),
        "journeyId": journey_id,
        "type": "START",
        "payload": {"startTime": "2026-03-01T08:00:00Z", "destinationAddress": "Site 14"},
        "localSeq": 1
    })
}

fn stop(journey_id: Uuid, meters: f64) -> Value {
    json!({
        "opId": Uuid::new_v4(),
        "journeyId": journey_id,
        "type": "STOP",
        "payload": {"endTime": "2026-03-01T09:30:00Z", "distance": meters},
        "localSeq": 3
    })
}

fn statuses(body: &Value) -> Vec<String> {
    data(body)["acks"]
        .as_array()
        .map(|acks| {
            acks.iter()
                .map(|ack| ack["status"].as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn duplicate_op_is_acknowledged_without_reapplying() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.token(Uuid::new_v4(), Role::Field);
    let journey = Uuid::new_v4();
    let op = start(journey);

    let (status, first) = server.post("/journey-ops/sync", &token, json!({"ops": [op.clone()]})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(statuses(&first), ["OK"]);

    let (_, second) = server.post("/journey-ops/sync", &token, json!({"ops": [op]})).await?;
    assert_eq!(statuses(&second), ["ALREADY_PROCESSED"]);
    assert_eq!(
        data(&first)["acks"][0]["serverSeq"],
        data(&second)["acks"][0]["serverSeq"]
    );

    let (_, pulled) = server.get("/journey-ops?after=0", &token).await?;
    assert_eq!(data(&pulled).as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn one_bad_op_fails_alone() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.token(Uuid::new_v4(), Role::Field);
    let journey = Uuid::new_v4();
    let orphan_move = json!({
        "opId": Uuid::new_v4(),
        "journeyId": Uuid::new_v4(),
        "type": "MOVE",
        "payload": {"latitude": 17.38, "longitude": 78.48}
    });

    let (status, body) = server
        .post(
            "/journey-ops/sync",
            &token,
            json!({"lastServerSeq": 0, "ops": [start(journey), orphan_move, stop(journey, 12345.0)]}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(statuses(&body), ["OK", "FAILED", "OK"]);
    assert!(data(&body)["acks"][1]["error"].is_string());
    assert_eq!(data(&body)["latestServerSeq"], data(&body)["acks"][2]["serverSeq"]);

    let (status, body) = server.get(&format!("/journeys/{}", journey), &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["status"], "COMPLETED");
    assert_eq!(data(&body)["totalDistance"].as_f64(), Some(12.345));
    Ok(())
}

#[tokio::test]
async fn journeys_belong_to_their_starter() -> Result<()> {
    let server = TestServer::spawn().await?;
    let owner = server.token(Uuid::new_v4(), Role::Field);
    let stranger = server.token(Uuid::new_v4(), Role::Field);
    let journey = Uuid::new_v4();

    server.post("/journey-ops/sync", &owner, json!({"ops": [start(journey)]})).await?;

    let (_, body) = server
        .post("/journey-ops/sync", &stranger, json!({"ops": [stop(journey, 10.0)]}))
        .await?;
    assert_eq!(statuses(&body), ["FAILED"]);

    let (status, _) = server.get(&format!("/journeys/{}", journey), &stranger).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, pulled) = server.get("/journey-ops?after=0", &stranger).await?;
    assert_eq!(data(&pulled).as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn oversized_batch_is_rejected_whole() -> Result<()> {
    let mut config = fieldops_api::config::AppConfig::development();
    config.sync.max_batch_size = 2;
    let server = TestServer::spawn_with(config).await?;
    let token = server.token(Uuid::new_v4(), Role::Field);

    let ops: Vec<Value> = (0..3).map(|_| start(Uuid::new_v4())).collect();
    let (status, body) = server.post("/journey-ops/sync", &token, json!({"ops": ops})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (_, pulled) = server.get("/journey-ops?after=0", &token).await?;
    assert_eq!(data(&pulled).as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn rebuild_refolds_the_projection() -> Result<()> {
    let server = TestServer::spawn().await?;
    let field = server.token(Uuid::new_v4(), Role::Field);
    let admin = server.admin();
    let journey = Uuid::new_v4();

    server
        .post("/journey-ops/sync", &field, json!({"ops": [start(journey), stop(journey, 1500.5)]}))
        .await?;

    let (status, _) = server.post("/journeys/rebuild", &field, json!({})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = server.post("/journeys/rebuild", &admin, json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(data(&body)["journeys"], 1);

    let (_, body) = server.get(&format!("/journeys/{}", journey), &admin).await?;
    assert_eq!(data(&body)["totalDistance"].as_f64(), Some(1.501));
    Ok(())
}

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use fieldops_api::auth::{generate_jwt, Claims, Role};
use fieldops_api::config::AppConfig;
use fieldops_api::database::models::{LedgerEntry, LedgerSource, Mason, Reward};
use fieldops_api::ledger::{apply_effects, Effect};
use fieldops_api::store::{MemoryStore, Store};
use fieldops_api::{app, AppState};

/// An in-process server, by default over a fresh in-memory store. Each
/// test gets its own so seeded data never leaks between tests.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub store: Arc<dyn Store>,
    pub config: AppConfig,
    client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(AppConfig::development()).await
    }

    pub async fn spawn_with(config: AppConfig) -> Result<Self> {
        Self::spawn_on(Arc::new(MemoryStore::new()), config).await
    }

    /// Serve over a caller-provided store, e.g. a migrated Postgres pool
    pub async fn spawn_on(store: Arc<dyn Store>, config: AppConfig) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test port")?;
        let router = app(AppState::new(store.clone(), config.clone()));
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self {
            port,
            base_url,
            store,
            config,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://127.0.0.1:{}/ws?token={}", self.port, token)
    }

    pub fn token(&self, user_id: Uuid, role: Role) -> String {
        let claims = Claims::new(user_id, "tester", role, 1);
        generate_jwt(&claims, &self.config.security.jwt_secret).expect("token")
    }

    pub fn approver(&self) -> String {
        self.token(Uuid::new_v4(), Role::Approver)
    }

    pub fn admin(&self) -> String {
        self.token(Uuid::new_v4(), Role::Admin)
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        let res = self.client.get(self.url(path)).bearer_auth(token).send().await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        let res = self.client.post(self.url(path)).bearer_auth(token).json(&body).send().await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn patch(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        let res = self.client.patch(self.url(path)).bearer_auth(token).json(&body).send().await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn seed_mason(&self, name: &str) -> Result<Mason> {
        self.insert_mason(Mason::new(name)).await
    }

    pub async fn insert_mason(&self, mason: Mason) -> Result<Mason> {
        let mut tx = self.store.begin().await?;
        tx.insert_mason(&mason).await?;
        tx.commit().await?;
        Ok(mason)
    }

    pub async fn seed_reward(&self, name: &str, point_cost: i64, stock: i64) -> Result<Reward> {
        let reward = Reward::new(name, point_cost, stock);
        let mut tx = self.store.begin().await?;
        tx.insert_reward(&reward).await?;
        tx.commit().await?;
        Ok(reward)
    }

    /// Credit an account through the ledger so balance and entries agree
    pub async fn credit(&self, mason_id: Uuid, points: i64) -> Result<()> {
        let entry = LedgerEntry::new(mason_id, LedgerSource::Adjustment, None, points, "opening balance");
        let mut tx = self.store.begin().await?;
        apply_effects(tx.as_mut(), &[Effect::Post(entry)]).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn stock(&self, reward_id: Uuid) -> Result<i64> {
        let mut tx = self.store.read().await?;
        let reward = tx.reward(reward_id).await?.context("reward missing")?;
        Ok(reward.stock)
    }
}

pub fn data(body: &Value) -> &Value {
    assert_eq!(body["success"], Value::Bool(true), "expected success envelope: {}", body);
    &body["data"]
}

pub fn error_code(body: &Value) -> &str {
    assert_eq!(body["success"], Value::Bool(false), "expected error envelope: {}", body);
    body["code"].as_str().unwrap_or_default()
}

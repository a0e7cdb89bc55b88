//! Common test utilities
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response},
    middleware, Router,
};
use chrono::{NaiveDate, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use recurring_ledger::api::{self, AppState};
use recurring_ledger::domain::{
    Frequency, Interval, Money, NewRecurringDefinition, RecurringDefinition,
};
use recurring_ledger::store::{InMemoryRecurringStore, RecurringStore, SharedStore};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One user with one account in a fresh in-memory store
pub struct TestLedger {
    pub memory: Arc<InMemoryRecurringStore>,
    pub store: SharedStore,
    pub user_id: Uuid,
    pub account_id: Uuid,
}

impl TestLedger {
    pub fn new() -> Self {
        let memory = Arc::new(InMemoryRecurringStore::new());
        let user_id = Uuid::new_v4();
        let account_id = memory.add_account(user_id);
        Self {
            store: memory.clone(),
            memory,
            user_id,
            account_id,
        }
    }

    /// Store a definition for this user directly, bypassing the API
    pub async fn definition(
        &self,
        amount: Decimal,
        frequency: Frequency,
        interval: u32,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> RecurringDefinition {
        let definition = RecurringDefinition::create(
            NewRecurringDefinition {
                user_id: self.user_id,
                description: format!("{} every {}", frequency, interval),
                notes: None,
                amount: Money::new(amount).unwrap(),
                frequency,
                interval: Interval::new(i64::from(interval)).unwrap(),
                start_date,
                end_date,
                account_id: self.account_id,
                category_id: None,
                is_subscription: false,
            },
            Utc::now(),
        )
        .unwrap();
        self.store.insert_definition(&definition).await.unwrap();
        definition
    }

    pub async fn reload(&self, id: Uuid) -> RecurringDefinition {
        self.store
            .get_definition(id)
            .await
            .unwrap()
            .expect("definition should exist")
    }

    /// API router with the same middleware stack as the server
    pub fn router(&self, max_catch_up_iterations: usize) -> Router {
        api::create_router()
            .layer(middleware::from_fn(api::middleware::logging_middleware))
            .layer(middleware::from_fn(api::middleware::context_middleware))
            .with_state(AppState::new(self.store.clone(), max_catch_up_iterations))
    }

    pub fn request(&self, method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("X-Request-User-Id", self.user_id.to_string());
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Connect to `DATABASE_URL` and apply the schema.
///
/// Every test works with fresh random ids, so no truncation is needed.
pub async fn setup_test_db() -> sqlx::PgPool {
    use sqlx::Executor;

    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    pool.execute(include_str!("../../migrations/0001_recurring_ledger.sql"))
        .await
        .expect("Failed to apply schema");

    pool
}

/// Insert an account owned by `user_id`
pub async fn seed_account(pool: &sqlx::PgPool, user_id: Uuid) -> Uuid {
    let account_id = Uuid::new_v4();
    sqlx::query("INSERT INTO accounts (id, user_id, name) VALUES ($1, $2, 'Checking')")
        .bind(account_id)
        .bind(user_id)
        .execute(pool)
        .await
        .expect("Failed to seed account");
    account_id
}

//! Cluster fixtures: seed workers, jobs, builds and containers for lifecycle tests
#![allow(dead_code)]

use sqlx::{Row, SqlitePool};
use worker_lifecycle::WorkerState;

pub const MINUTE_MS: i64 = 60_000;

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Worker row as the tests want to seed it
#[derive(Debug, Clone)]
pub struct WorkerSeed {
    pub name: String,
    pub state: WorkerState,
    pub expires: Option<i64>,
    pub ephemeral: bool,
}

impl WorkerSeed {
    pub fn new(name: &str, state: WorkerState) -> Self {
        Self {
            name: name.to_string(),
            state,
            expires: None,
            ephemeral: false,
        }
    }

    pub fn expired(mut self) -> Self {
        self.expires = Some(now_ms() - MINUTE_MS);
        self
    }

    pub fn expiring_later(mut self) -> Self {
        self.expires = Some(now_ms() + 10 * MINUTE_MS);
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

pub async fn seed_worker(pool: &SqlitePool, seed: &WorkerSeed) {
    sqlx::query(
        "INSERT INTO workers (name, state, expires, ephemeral, addr, baggageclaim_url) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&seed.name)
    .bind(seed.state.as_str())
    .bind(seed.expires)
    .bind(seed.ephemeral)
    .bind(format!("{}:7777", seed.name))
    .bind(format!("http://{}:7788", seed.name))
    .execute(pool)
    .await
    .expect("Failed to seed worker");
}

pub async fn seed_job(pool: &SqlitePool, id: i64, interruptible: bool) {
    sqlx::query("INSERT INTO jobs (id, name, interruptible) VALUES (?, ?, ?)")
        .bind(id)
        .bind(format!("job-{id}"))
        .bind(interruptible)
        .execute(pool)
        .await
        .expect("Failed to seed job");
}

pub async fn seed_build(pool: &SqlitePool, id: i64, job_id: Option<i64>, completed: bool) {
    sqlx::query("INSERT INTO builds (id, job_id, completed) VALUES (?, ?, ?)")
        .bind(id)
        .bind(job_id)
        .bind(completed)
        .execute(pool)
        .await
        .expect("Failed to seed build");
}

pub async fn seed_container(pool: &SqlitePool, handle: &str, build_id: Option<i64>, worker: &str) {
    sqlx::query("INSERT INTO containers (handle, build_id, worker_name) VALUES (?, ?, ?)")
        .bind(handle)
        .bind(build_id)
        .bind(worker)
        .execute(pool)
        .await
        .expect("Failed to seed container");
}

pub async fn worker_state(pool: &SqlitePool, name: &str) -> Option<String> {
    sqlx::query("SELECT state FROM workers WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .expect("Failed to read worker")
        .map(|row| row.get("state"))
}

pub async fn worker_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM workers")
        .fetch_one(pool)
        .await
        .expect("Failed to count workers")
}

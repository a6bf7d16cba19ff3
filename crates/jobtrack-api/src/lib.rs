pub mod applications;
pub mod auth;
pub mod error;
pub mod intake;
pub mod mail;
pub mod middleware;
pub mod postings;
pub mod profile;
pub mod resumes;
pub mod seed;
pub mod state;
pub mod storage;
pub mod upload;
pub mod validation;

/// GET /health: liveness check (no auth).
pub async fn health() -> &'static str {
    "ok"
}

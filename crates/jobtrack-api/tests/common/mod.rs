#![allow(dead_code)]

use std::sync::Arc;

use jobtrack_api::auth::insert_account_with_profile;
use jobtrack_api::mail::MemoryMailer;
use jobtrack_api::state::{AppState, AppStateInner};
use jobtrack_api::storage::Storage;
use jobtrack_db::Database;
use jobtrack_db::queries::accounts::{NewAccount, ProfileFields};
use jobtrack_db::queries::resumes::{self, NewResume};
use tempfile::TempDir;

pub struct Harness {
    pub state: AppState,
    pub mailer: Arc<MemoryMailer>,
    // Dropped last: removes the media directory.
    pub media: TempDir,
}

pub async fn harness() -> Harness {
    let media = TempDir::new().expect("temp media dir");
    let storage = Storage::new(media.path().to_path_buf())
        .await
        .expect("storage opens");
    let mailer = Arc::new(MemoryMailer::new());
    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().expect("in-memory db"),
        jwt_secret: "integration-test-secret".into(),
        public_url: "http://jobtrack.test".into(),
        storage,
        mailer: mailer.clone(),
    });
    Harness { state, mailer, media }
}

/// Active account with an empty profile; the password hash is never checked here.
pub fn account(state: &AppState, username: &str) -> i64 {
    state
        .db
        .with_tx(|tx| {
            insert_account_with_profile(
                tx,
                &NewAccount {
                    username,
                    email: &format!("{username}@example.com"),
                    password_hash: "not-a-real-hash",
                    first_name: "Test",
                    last_name: "User",
                    is_active: true,
                },
                &ProfileFields::default(),
            )
        })
        .expect("account inserted")
}

pub fn resume(state: &AppState, account_id: i64, description: &str) -> i64 {
    state
        .db
        .with_conn(|conn| {
            resumes::insert_resume(
                conn,
                &NewResume {
                    account_id,
                    description: description.to_string(),
                    ..Default::default()
                },
            )
        })
        .expect("resume inserted")
}

pub fn count(state: &AppState, table: &str) -> i64 {
    state
        .db
        .with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
        })
        .expect("count query")
}

/// Number of files under `dir` (relative to the media root).
pub fn files_in(harness: &Harness, dir: &str) -> usize {
    std::fs::read_dir(harness.media.path().join(dir))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

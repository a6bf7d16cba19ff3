pub mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use jobtrack_api::mail::Mailer;
use jobtrack_api::middleware::require_auth;
use jobtrack_api::state::{AppState, AppStateInner};
use jobtrack_api::storage::Storage;
use jobtrack_api::{applications, auth, health, intake, postings, profile, resumes};

use crate::config::Config;

pub async fn build_state(config: &Config, mailer: Arc<dyn Mailer>) -> anyhow::Result<AppState> {
    let db = config.open_database()?;
    let storage = Storage::new(config.media_dir.clone()).await?;
    Ok(Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        public_url: config.public_url.clone(),
        storage,
        mailer,
    }))
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/activate/{token}", get(auth::activate))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/profile", get(profile::get_profile).put(profile::update_profile))
        .route("/profile/picture", post(profile::upload_picture))
        .route("/profile/links", post(profile::create_link))
        .route("/profile/links/{id}", put(profile::update_link).delete(profile::delete_link))
        .route("/resumes", get(resumes::list_resumes).post(resumes::upload_resume))
        .route("/resumes/{id}", axum::routing::delete(resumes::delete_resume))
        .route("/resumes/{id}/file", get(resumes::download_resume))
        .route(
            "/applications",
            get(applications::list_applications).post(intake::create_application),
        )
        .route("/applications/form", get(applications::application_form))
        .route("/applications/{id}", get(applications::get_application))
        .route("/applications/{id}/status", patch(applications::update_status))
        .route("/postings", get(postings::list_postings).post(postings::create_posting))
        .route("/postings/{id}/apply", post(postings::apply_to_posting))
        .route("/links/{id}/interviews", post(postings::add_interview))
        .route("/report/applications", get(postings::applications_report))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use jobtrack_db::DbError;
use jobtrack_db::flatten::{FlattenOptions, flatten_record};
use jobtrack_db::queries::postings::{self, NewJobPosting};
use jobtrack_db::queries::resumes;
use jobtrack_types::api::{
    ApplicationsReport, ApplyToPostingRequest, Claims, CreateInterviewRequest,
    CreatePostingRequest, InterviewResponse, PostingApplicationResponse,
};
use jobtrack_types::models::JobPosting;

use crate::applications::today;
use crate::error::{ApiError, FieldErrors};
use crate::state::{AppState, with_db};
use crate::validation;

/// POST /postings
pub async fn create_posting(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<CreatePostingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = FieldErrors::new();
    validation::text(&mut errors, "company_name", &req.company_name, 100);
    validation::text(&mut errors, "job_position", &req.job_position, 50);
    validation::text(&mut errors, "work_location", &req.work_location, 100);
    errors.into_result()?;

    let new = NewJobPosting {
        company_name: req.company_name.trim().to_string(),
        job_position: req.job_position.trim().to_string(),
        work_mode: req.work_mode,
        work_location: req.work_location.trim().to_string(),
        termination_date: req.termination_date,
    };
    let row = with_db(&state, move |db| {
        db.with_conn(|conn| {
            let id = postings::insert_posting(conn, &new)?;
            postings::posting_by_id(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("posting {} vanished after insert", id))
        })
    })
    .await?;

    info!("Created job posting {} ({})", row.id, row.company_name);
    Ok((StatusCode::CREATED, Json(row.into_model())))
}

/// GET /postings: postings still open today.
pub async fn list_postings(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<Vec<JobPosting>>, ApiError> {
    let today = today();
    let rows =
        with_db(&state, move |db| db.with_conn(|conn| postings::open_postings(conn, today))).await?;
    Ok(Json(rows.into_iter().map(|r| r.into_model()).collect()))
}

/// POST /postings/{id}/apply: one application per account and posting.
pub async fn apply_to_posting(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(posting_id): Path<i64>,
    Json(req): Json<ApplyToPostingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = claims.sub;
    let (posting, link, application) = with_db(&state, move |db| {
        db.with_tx(|tx| {
            let posting = postings::posting_by_id(tx, posting_id)?
                .ok_or(ApiError::NotFound("Job posting not found".into()))?;
            if resumes::resume_for_account(tx, req.resume_id, account_id)?.is_none() {
                let missing = ApiError::NotFound(format!("Resume {} not found", req.resume_id));
                return Err(missing.into());
            }

            let application_id =
                postings::insert_posting_application(tx, req.resume_id, req.status)?;
            let link_id =
                postings::insert_application_link(tx, account_id, posting_id, application_id)
                    .map_err(|e| {
                        let duplicate = e
                            .downcast_ref::<DbError>()
                            .is_some_and(|db| db.is_unique_on("application_links.job_posting_id"));
                        if duplicate {
                            let msg = "You have already applied to this job posting.";
                            ApiError::Conflict(msg.into()).into()
                        } else {
                            e
                        }
                    })?;

            let link = postings::link_by_id(tx, link_id)?
                .ok_or_else(|| anyhow::anyhow!("link {} vanished after insert", link_id))?;
            let application = postings::posting_application_by_id(tx, application_id)?
                .ok_or_else(|| {
                    anyhow::anyhow!("application {} vanished after insert", application_id)
                })?;
            Ok((posting, link, application))
        })
    })
    .await?;

    info!("Account {} applied to posting {}", account_id, posting.id);
    Ok((
        StatusCode::CREATED,
        Json(PostingApplicationResponse {
            posting: posting.into_model(),
            link: link.into_model(application),
        }),
    ))
}

/// POST /links/{id}/interviews: schedule an interview on one of the caller's links.
pub async fn add_interview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(link_id): Path<i64>,
    Json(req): Json<CreateInterviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = claims.sub;
    let interview = with_db(&state, move |db| {
        db.with_conn(|conn| {
            let link = postings::link_for_account(conn, link_id, account_id)?
                .ok_or(ApiError::NotFound("Application link not found".into()))?;
            let id = postings::insert_interview(conn, link.application_id, req.interview_date)?;
            postings::interview_by_id(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("interview {} vanished after insert", id))
        })
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(InterviewResponse {
            interview: interview.into_model(),
        }),
    ))
}

/// GET /report/applications: the caller's application links, one flat row each.
pub async fn applications_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApplicationsReport>, ApiError> {
    let account_id = claims.sub;
    let rows = with_db(&state, move |db| {
        db.with_conn(|conn| {
            postings::links_for_account(conn, account_id)?
                .iter()
                .map(|link| flatten_record(conn, link, FlattenOptions::report()))
                .collect::<anyhow::Result<Vec<_>>>()
        })
    })
    .await?;

    let mut columns: Vec<String> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    Ok(Json(ApplicationsReport { columns, rows }))
}

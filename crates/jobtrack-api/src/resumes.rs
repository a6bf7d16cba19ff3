use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{error, info, warn};

use jobtrack_db::queries::resumes::{self, NewResume};
use jobtrack_types::api::Claims;
use jobtrack_types::format::resume_file_path;
use jobtrack_types::models::Resume;

use crate::error::{ApiError, FieldErrors};
use crate::state::{AppState, with_db};
use crate::upload::FormData;
use crate::validation;

/// GET /resumes
pub async fn list_resumes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Resume>>, ApiError> {
    let account_id = claims.sub;
    let rows = with_db(&state, move |db| {
        db.with_conn(|conn| resumes::resumes_for_account(conn, account_id))
    })
    .await?;
    Ok(Json(rows.into_iter().map(|r| r.into_model()).collect()))
}

/// POST /resumes: multipart: description, job_title, category, summary, file.
pub async fn upload_resume(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = FormData::read(multipart).await?;
    let file = form.take_file("file");

    let mut errors = FieldErrors::new();
    let description = match form.opt("description") {
        Some(d) => d.to_string(),
        None => file.as_ref().map(|f| f.file_name.clone()).unwrap_or_default(),
    };
    validation::text(&mut errors, "description", &description, 128);
    let job_title = validation::non_empty(form.opt("job_title"));
    validation::optional_text(&mut errors, "job_title", job_title.as_deref(), 64);
    let category = form.opt("category").unwrap_or_default().to_string();
    validation::max_len(&mut errors, "category", &category, 64);
    let summary = validation::non_empty(form.opt("summary"));
    if file.is_none() {
        errors.add("file", validation::REQUIRED);
    }
    errors.into_result()?;
    let Some(file) = file else {
        return Err(ApiError::field("file", validation::REQUIRED));
    };

    let path = resume_file_path(
        &claims.username,
        job_title.as_deref().unwrap_or_default(),
        &file.file_name,
        chrono::Utc::now(),
    );
    let stored = state.storage.save(&path, &file.data).await.map_err(ApiError::Internal)?;

    let new = NewResume {
        account_id: claims.sub,
        description,
        job_title,
        file_name: Some(file.file_name.clone()),
        file: Some(stored.clone()),
        summary,
        category,
    };
    let created = with_db(&state, move |db| {
        db.with_conn(|conn| {
            let id = resumes::insert_resume(conn, &new)?;
            resumes::resume_by_id(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("resume {} vanished after insert", id))
        })
    })
    .await;

    match created {
        Ok(row) => {
            info!("Stored resume {} for account {}", row.id, row.account_id);
            Ok((StatusCode::CREATED, Json(row.into_model())))
        }
        Err(e) => {
            if let Err(cleanup) = state.storage.delete_file(&stored).await {
                warn!("Failed to remove orphaned resume {}: {}", stored, cleanup);
            }
            Err(e)
        }
    }
}

/// GET /resumes/{id}/file: owner only; anyone else gets 404.
pub async fn download_resume(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(resume_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = claims.sub;
    let row = with_db(&state, move |db| {
        db.with_conn(|conn| resumes::resume_for_account(conn, resume_id, account_id))
    })
    .await?
    .ok_or(ApiError::NotFound("Resume not found".into()))?;

    let path = row
        .file
        .filter(|f| !f.is_empty())
        .ok_or(ApiError::NotFound("Resume has no file".into()))?;
    let bytes = state.storage.read(&path).await.map_err(|e| {
        error!("Failed to read resume file {}: {}", path, e);
        ApiError::NotFound("Resume file missing".into())
    })?;

    let file_name = row.file_name.unwrap_or_else(|| row.description.clone());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        file_name.replace(['"', '\\', '\r', '\n'], "_")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// DELETE /resumes/{id}: removes the row, then the file.
pub async fn delete_resume(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(resume_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let account_id = claims.sub;
    let removed = with_db(&state, move |db| {
        db.with_conn(|conn| resumes::delete_resume(conn, resume_id, account_id))
    })
    .await?
    .ok_or(ApiError::NotFound("Resume not found".into()))?;

    if let Some(path) = removed.file.filter(|f| !f.is_empty()) {
        if let Err(e) = state.storage.delete_file(&path).await {
            warn!("Failed to remove resume file {}: {}", path, e);
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

//! New job application intake.
//!
//! A submission carries the application fields, the detail fields and a résumé
//! choice: an existing résumé of the submitter, a freshly uploaded file, or
//! nothing. Everything is validated before the first write; the records are
//! then created in one transaction so a failure leaves neither rows nor an
//! orphaned upload behind.

use axum::{
    Extension, Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};

use jobtrack_db::queries::applications::{self, NewApplicationDetail, NewJobApplication};
use jobtrack_db::queries::resumes::{self, NewResume};
use jobtrack_types::api::{Claims, IntakeResponse};
use jobtrack_types::format::resume_file_path;
use jobtrack_types::models::ApplicationStatus;

use crate::applications::{UPLOAD_NEW, load_application, today};
use crate::error::{ApiError, FieldErrors};
use crate::state::{AppState, with_db};
use crate::upload::{FormData, UploadedFile};
use crate::validation;

/// Raw application fields as submitted.
#[derive(Debug, Default, Clone)]
pub struct ApplicationInput {
    pub job_name: String,
    pub company: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub apply_date: String,
    pub valid_to: String,
    pub portal: Option<String>,
    pub link: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct DetailInput {
    pub job_application_body: Option<String>,
    pub comments: Option<String>,
    pub salary_range: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct IntakeSubmission {
    pub application: ApplicationInput,
    pub detail: DetailInput,
    /// `upload_new`, a résumé id, or nothing.
    pub resume: Option<String>,
    pub new_resume: Option<UploadedFile>,
}

impl IntakeSubmission {
    pub fn from_form(mut form: FormData) -> Self {
        let opt = |name: &str| validation::non_empty(form.opt(name));
        let application = ApplicationInput {
            job_name: form.text("job_name").trim().to_string(),
            company: form.text("company").trim().to_string(),
            country: opt("country"),
            city: opt("city"),
            apply_date: form.text("apply_date").to_string(),
            valid_to: form.text("valid_to").to_string(),
            portal: opt("portal"),
            link: opt("link"),
            status: opt("status"),
        };
        let detail = DetailInput {
            job_application_body: opt("job_application_body"),
            comments: opt("comments"),
            salary_range: opt("salary_range"),
        };
        let resume = opt("resume");
        let new_resume = form.take_file("new_resume");
        Self {
            application,
            detail,
            resume,
            new_resume,
        }
    }
}

/// Where the application's résumé comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeSource {
    None,
    Existing(i64),
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeOutcome {
    pub application_id: i64,
    pub detail_id: i64,
    pub new_resume_id: Option<i64>,
}

pub fn validate_application(input: &ApplicationInput) -> Result<NewJobApplication, FieldErrors> {
    let mut errors = FieldErrors::new();
    validation::text(&mut errors, "job_name", &input.job_name, 64);
    validation::text(&mut errors, "company", &input.company, 64);
    validation::optional_text(&mut errors, "country", input.country.as_deref(), 32);
    validation::optional_text(&mut errors, "city", input.city.as_deref(), 64);
    let apply_date = validation::date(&mut errors, "apply_date", &input.apply_date);
    let valid_to = validation::date(&mut errors, "valid_to", &input.valid_to);
    validation::optional_text(&mut errors, "portal", input.portal.as_deref(), 32);
    if let Some(link) = input.link.as_deref() {
        validation::url(&mut errors, "link", link, 128);
    }
    let status = match input.status.as_deref() {
        None => ApplicationStatus::default(),
        Some(s) => s.parse().unwrap_or_else(|e| {
            errors.add("status", format!("{e}"));
            ApplicationStatus::default()
        }),
    };

    match (apply_date, valid_to) {
        (Some(apply_date), Some(valid_to)) if errors.is_empty() => Ok(NewJobApplication {
            job_name: input.job_name.clone(),
            company: input.company.clone(),
            country: input.country.clone(),
            city: input.city.clone(),
            apply_date,
            valid_to,
            portal: input.portal.clone(),
            link: input.link.clone(),
            status,
        }),
        _ => Err(errors),
    }
}

/// Detail fields plus the résumé choice. `has_file` says whether a
/// `new_resume` part was supplied.
pub fn validate_detail(
    input: &DetailInput,
    choice: Option<&str>,
    has_file: bool,
) -> Result<(NewApplicationDetail, ResumeSource), FieldErrors> {
    let mut errors = FieldErrors::new();
    validation::optional_text(&mut errors, "salary_range", input.salary_range.as_deref(), 32);

    let source = match choice {
        None if has_file => ResumeSource::Upload,
        None => ResumeSource::None,
        Some(UPLOAD_NEW) if has_file => ResumeSource::Upload,
        Some(UPLOAD_NEW) => {
            errors.add("new_resume", "Select a file to upload, or choose an existing resume.");
            ResumeSource::None
        }
        Some(value) => match value.parse::<i64>() {
            Ok(_) if has_file => {
                errors.add(
                    "resume",
                    "Choose an existing resume or upload a new one, not both.",
                );
                ResumeSource::None
            }
            Ok(id) => ResumeSource::Existing(id),
            Err(_) => {
                errors.add(
                    "resume",
                    format!("Select a valid choice. {value} is not one of the available choices."),
                );
                ResumeSource::None
            }
        },
    };

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok((
        NewApplicationDetail {
            job_application_body: input.job_application_body.clone(),
            comments: input.comments.clone(),
            salary_range: input.salary_range.clone(),
        },
        source,
    ))
}

/// Validate and persist a submission for `account_id`.
pub async fn submit(
    state: &AppState,
    account_id: i64,
    username: &str,
    submission: IntakeSubmission,
) -> Result<IntakeOutcome, ApiError> {
    let application = validate_application(&submission.application).map_err(ApiError::Validation)?;
    let (detail, source) = validate_detail(
        &submission.detail,
        submission.resume.as_deref(),
        submission.new_resume.is_some(),
    )
    .map_err(ApiError::Validation)?;

    let upload = match (source, submission.new_resume) {
        (ResumeSource::Upload, Some(file)) => {
            let now = chrono::Utc::now();
            let path = resume_file_path(username, &application.job_name, &file.file_name, now);
            let stored = state.storage.save(&path, &file.data).await.map_err(ApiError::Internal)?;
            Some((stored, file.file_name))
        }
        _ => None,
    };

    let stored_path = upload.as_ref().map(|(path, _)| path.clone());
    let result = with_db(state, move |db| {
        db.with_tx(|tx| {
            // Only the submitter's own résumés are selectable.
            if let ResumeSource::Existing(id) = source {
                if resumes::resume_for_account(tx, id, account_id)?.is_none() {
                    return Err(ApiError::NotFound(format!("Resume {id} not found")).into());
                }
            }

            let application_id = applications::insert_job_application(tx, &application)?;
            applications::add_account_to_application(tx, application_id, account_id)?;

            let (resume_id, new_resume_id) = match (source, upload) {
                (ResumeSource::Existing(id), _) => (Some(id), None),
                (ResumeSource::Upload, Some((path, original_name))) => {
                    let id = resumes::insert_resume(
                        tx,
                        &NewResume {
                            account_id,
                            description: original_name.clone(),
                            job_title: Some(application.job_name.clone()),
                            file_name: Some(original_name),
                            file: Some(path),
                            ..Default::default()
                        },
                    )?;
                    (Some(id), Some(id))
                }
                _ => (None, None),
            };

            let detail_id = applications::insert_application_detail(tx, application_id, &detail)?;
            if let Some(resume_id) = resume_id {
                applications::attach_resume_to_detail(tx, detail_id, resume_id)?;
            }

            Ok(IntakeOutcome {
                application_id,
                detail_id,
                new_resume_id,
            })
        })
    })
    .await;

    match result {
        Ok(outcome) => {
            info!(
                "Account {} created job application {} (detail {})",
                account_id, outcome.application_id, outcome.detail_id
            );
            Ok(outcome)
        }
        Err(e) => {
            if let Some(path) = stored_path {
                if let Err(cleanup) = state.storage.delete_file(&path).await {
                    warn!("Failed to remove orphaned upload {}: {}", path, cleanup);
                }
            }
            Err(e)
        }
    }
}

/// POST /applications: multipart intake form.
pub async fn create_application(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = FormData::read(multipart).await?;
    let submission = IntakeSubmission::from_form(form);
    let outcome = submit(&state, claims.sub, &claims.username, submission).await?;

    let account_id = claims.sub;
    let today = today();
    let (loaded, new_resume) = with_db(&state, move |db| {
        db.with_conn(|conn| {
            let loaded = load_application(conn, outcome.application_id, account_id, today)?;
            let new_resume = match outcome.new_resume_id {
                Some(id) => resumes::resume_by_id(conn, id)?,
                None => None,
            };
            Ok((loaded, new_resume))
        })
    })
    .await?;

    let loaded = loaded
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("application vanished after insert")))?;
    let detail = loaded
        .detail
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("detail vanished after insert")))?;

    Ok((
        StatusCode::CREATED,
        Json(IntakeResponse {
            application: loaded.application,
            detail,
            new_resume: new_resume.map(|r| r.into_model()),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application() -> ApplicationInput {
        ApplicationInput {
            job_name: "Rust Developer".into(),
            company: "Acme".into(),
            country: Some("Poland".into()),
            city: Some("Kraków".into()),
            apply_date: "2025-03-01".into(),
            valid_to: "2025-03-31".into(),
            ..Default::default()
        }
    }

    #[test]
    fn valid_application_defaults_to_applied() {
        let app = validate_application(&application()).unwrap();
        assert_eq!(app.status, ApplicationStatus::Applied);
        assert_eq!(app.valid_to.to_string(), "2025-03-31");
    }

    #[test]
    fn application_errors_are_per_field() {
        let input = ApplicationInput {
            job_name: String::new(),
            company: "C".repeat(65),
            apply_date: "yesterday".into(),
            link: Some("not a url".into()),
            status: Some("ghosted".into()),
            ..application()
        };
        let errors = validate_application(&input).unwrap_err();
        for field in ["job_name", "company", "apply_date", "link", "status"] {
            assert!(errors.has(field), "expected error on {field}");
        }
        assert!(!errors.has("valid_to"));
    }

    #[test]
    fn resume_choice_rules() {
        let detail = DetailInput::default();
        let source = |choice, file| validate_detail(&detail, choice, file).map(|(_, s)| s);

        assert_eq!(source(None, false).unwrap(), ResumeSource::None);
        assert_eq!(source(None, true).unwrap(), ResumeSource::Upload);
        assert_eq!(source(Some("upload_new"), true).unwrap(), ResumeSource::Upload);
        assert_eq!(source(Some("12"), false).unwrap(), ResumeSource::Existing(12));

        assert!(source(Some("upload_new"), false).unwrap_err().has("new_resume"));
        assert!(source(Some("12"), true).unwrap_err().has("resume"));
        assert!(source(Some("twelve"), false).unwrap_err().has("resume"));
    }

    #[test]
    fn salary_range_is_bounded() {
        let detail = DetailInput {
            salary_range: Some("9".repeat(33)),
            ..Default::default()
        };
        assert!(validate_detail(&detail, None, false).unwrap_err().has("salary_range"));
    }
}

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::{Local, NaiveDate};

use jobtrack_db::Connection;
use jobtrack_db::queries::applications::{self, ApplicationSort};
use jobtrack_db::queries::{accounts, resumes};
use jobtrack_types::api::{
    ApplicationFormInitial, ApplicationFormResponse, ApplicationListQuery, ApplicationPage,
    ApplicationResponse, Claims, ResumeChoice, UpdateStatusRequest,
};
use jobtrack_types::models::{ApplicationStatus, JobApplication};

use crate::error::ApiError;
use crate::state::{AppState, with_db};

pub const PAGE_SIZE: u32 = 20;
pub const UPLOAD_NEW: &str = "upload_new";

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// GET /applications?sort=&order=&page=
///
/// Unknown sort keys fall back to `apply_date`; anything but `asc` sorts descending.
pub async fn list_applications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<ApplicationPage>, ApiError> {
    let sort = query
        .sort
        .as_deref()
        .and_then(ApplicationSort::from_param)
        .unwrap_or_default();
    let descending = query.order.as_deref() != Some("asc");
    let requested = query.page.unwrap_or(1).max(1);

    let account_id = claims.sub;
    let (rows, total, page) = with_db(&state, move |db| {
        db.with_conn(|conn| {
            let total = applications::count_applications_for_account(conn, account_id)?;
            let pages = total_pages(total);
            let page = requested.min(pages.max(1));
            let rows = applications::applications_for_account(
                conn,
                account_id,
                sort,
                descending,
                PAGE_SIZE,
                (page - 1) * PAGE_SIZE,
            )?;
            Ok((rows, total, page))
        })
    })
    .await?;

    let today = today();
    Ok(Json(ApplicationPage {
        items: rows.into_iter().map(|r| r.into_model(today)).collect(),
        page,
        total_pages: total_pages(total),
        total,
        sort: sort.as_param().to_string(),
        order: if descending { "desc" } else { "asc" }.to_string(),
    }))
}

fn total_pages(total: u64) -> u32 {
    total.div_ceil(PAGE_SIZE as u64) as u32
}

/// Application plus its detail and attached résumés, if `account_id` is associated with it.
pub fn load_application(
    conn: &Connection,
    id: i64,
    account_id: i64,
    today: NaiveDate,
) -> anyhow::Result<Option<ApplicationResponse>> {
    let Some(row) = applications::application_for_account(conn, id, account_id)? else {
        return Ok(None);
    };
    let detail = match applications::detail_for_application(conn, row.id)? {
        Some(detail) => {
            let attached = applications::resumes_for_detail(conn, detail.id)?;
            Some(detail.into_model(attached))
        }
        None => None,
    };
    Ok(Some(ApplicationResponse {
        application: row.into_model(today),
        detail,
    }))
}

/// GET /applications/{id}
pub async fn get_application(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApplicationResponse>, ApiError> {
    let account_id = claims.sub;
    let today = today();
    let response = with_db(&state, move |db| {
        db.with_conn(|conn| load_application(conn, id, account_id, today))
    })
    .await?
    .ok_or(ApiError::NotFound("Job application not found".into()))?;
    Ok(Json(response))
}

/// PATCH /applications/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<JobApplication>, ApiError> {
    let account_id = claims.sub;
    let today = today();
    let row = with_db(&state, move |db| {
        db.with_conn(|conn| {
            if !applications::update_application_status(conn, id, account_id, req.status)? {
                return Ok(None);
            }
            applications::job_application_by_id(conn, id)
        })
    })
    .await?
    .ok_or(ApiError::NotFound("Job application not found".into()))?;
    Ok(Json(row.into_model(today)))
}

/// `upload_new` first, then the account's own résumés as `(id, description)`.
pub fn resume_choices(conn: &Connection, account_id: i64) -> anyhow::Result<Vec<ResumeChoice>> {
    let mut choices = vec![ResumeChoice {
        value: UPLOAD_NEW.to_string(),
        label: "Upload new resume".to_string(),
    }];
    choices.extend(
        resumes::resumes_for_account(conn, account_id)?
            .into_iter()
            .map(|r| ResumeChoice {
                value: r.id.to_string(),
                label: r.description,
            }),
    );
    Ok(choices)
}

/// GET /applications/form: initial values for a new application.
pub async fn application_form(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApplicationFormResponse>, ApiError> {
    let account_id = claims.sub;
    let (profile, resume_choices) = with_db(&state, move |db| {
        db.with_conn(|conn| {
            let profile = accounts::profile_by_account(conn, account_id)?;
            Ok((profile, resume_choices(conn, account_id)?))
        })
    })
    .await?;

    let (country, city) = match profile {
        Some(p) => (p.country, p.city),
        None => (None, None),
    };
    Ok(Json(ApplicationFormResponse {
        initial: ApplicationFormInitial {
            country,
            city,
            apply_date: today(),
            status: ApplicationStatus::default(),
        },
        resume_choices,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(total_pages(0), 0);
        assert_eq!(total_pages(20), 1);
        assert_eq!(total_pages(21), 2);
    }
}

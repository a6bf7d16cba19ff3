use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};

use jobtrack_db::DbError;
use jobtrack_db::queries::accounts::{self, ProfileFields};
use jobtrack_types::api::{Claims, ProfileResponse, SiteLinkRequest, UpdateProfileRequest};
use jobtrack_types::format::{capitalize_name, profile_picture_path};
use jobtrack_types::models::SiteLink;

use crate::error::{ApiError, FieldErrors};
use crate::state::{AppState, with_db};
use crate::upload::FormData;
use crate::validation;

const DUPLICATE_URL: &str = "Site link with this URL already exists.";

async fn load_profile(state: &AppState, account_id: i64) -> Result<ProfileResponse, ApiError> {
    with_db(state, move |db| {
        db.with_conn(|conn| {
            let account = accounts::account_by_id(conn, account_id)?
                .ok_or(ApiError::NotFound("Account not found".into()))?;
            let profile = accounts::profile_by_account(conn, account_id)?
                .ok_or(ApiError::NotFound("Profile not found".into()))?;
            let site_links = accounts::site_links_for_account(conn, account_id)?;
            Ok(ProfileResponse {
                account: account.into_model(),
                profile: profile.into_model(),
                site_links: site_links.into_iter().map(|l| l.into_model()).collect(),
            })
        })
    })
    .await
}

/// GET /profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(load_profile(&state, claims.sub).await?))
}

/// PUT /profile: fields left out of the body keep their stored value.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = FieldErrors::new();
    let first_name = req.first_name.as_deref().map(capitalize_name);
    let last_name = req.last_name.as_deref().map(capitalize_name);
    validation::optional_text(&mut errors, "first_name", first_name.as_deref(), 150);
    validation::optional_text(&mut errors, "last_name", last_name.as_deref(), 150);
    let phone = req
        .phone_number
        .as_deref()
        .map(|p| validation::phone(&mut errors, "phone_number", Some(p)));
    validation::optional_text(&mut errors, "country", req.country.as_deref(), 20);
    validation::optional_text(&mut errors, "city", req.city.as_deref(), 20);
    errors.into_result()?;

    let account_id = claims.sub;
    with_db(&state, move |db| {
        db.with_tx(|tx| {
            let account = accounts::account_by_id(tx, account_id)?
                .ok_or(ApiError::NotFound("Account not found".into()))?;
            let profile = accounts::profile_by_account(tx, account_id)?
                .ok_or(ApiError::NotFound("Profile not found".into()))?;

            accounts::update_account_names(
                tx,
                account_id,
                first_name.as_deref().unwrap_or(&account.first_name),
                last_name.as_deref().unwrap_or(&account.last_name),
            )?;
            let fields = ProfileFields {
                // `Some("")` clears the number, absent keeps it
                phone_number: match phone {
                    Some(normalized) => normalized,
                    None => profile.phone_number,
                },
                country: match req.country {
                    Some(c) => validation::non_empty(Some(&c)),
                    None => profile.country,
                },
                city: match req.city {
                    Some(c) => validation::non_empty(Some(&c)),
                    None => profile.city,
                },
                profile_picture: profile.profile_picture,
            };
            accounts::update_profile(tx, account_id, &fields)
        })
    })
    .await?;

    info!("Updated profile of account {}", account_id);
    Ok(Json(load_profile(&state, account_id).await?))
}

/// POST /profile/picture: multipart with a `profile_picture` file part.
pub async fn upload_picture(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = FormData::read(multipart).await?;
    let file = form
        .take_file("profile_picture")
        .ok_or_else(|| ApiError::field("profile_picture", validation::REQUIRED))?;

    let path = profile_picture_path(&claims.username, &file.file_name, chrono::Utc::now());
    let stored = state.storage.save(&path, &file.data).await.map_err(ApiError::Internal)?;

    let account_id = claims.sub;
    let new_path = stored.clone();
    let previous = match with_db(&state, move |db| {
        db.with_conn(|conn| accounts::set_profile_picture(conn, account_id, &new_path))
    })
    .await
    {
        Ok(previous) => previous,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete_file(&stored).await {
                warn!("Failed to remove picture {} after a failed update: {}", stored, cleanup);
            }
            return Err(e);
        }
    };

    if let Some(old) = previous.filter(|old| *old != stored) {
        if let Err(e) = state.storage.delete_file(&old).await {
            warn!("Failed to remove old picture {}: {}", old, e);
        }
    }

    Ok(Json(load_profile(&state, account_id).await?))
}

fn validate_link(req: &SiteLinkRequest) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    validation::text(&mut errors, "name", &req.name, 50);
    validation::url(&mut errors, "url", &req.url, 200);
    errors.into_result()
}

fn duplicate_url(err: anyhow::Error) -> anyhow::Error {
    let duplicate = err
        .downcast_ref::<DbError>()
        .is_some_and(|db| db.is_unique_on("site_links.url"));
    if duplicate {
        ApiError::field("url", DUPLICATE_URL).into()
    } else {
        err
    }
}

/// POST /profile/links
pub async fn create_link(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SiteLinkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_link(&req)?;

    let account_id = claims.sub;
    let link = with_db(&state, move |db| {
        db.with_conn(|conn| {
            let description = validation::non_empty(req.description.as_deref());
            let id = accounts::insert_site_link(
                conn,
                account_id,
                req.name.trim(),
                req.url.trim(),
                description.as_deref(),
            )
            .map_err(duplicate_url)?;
            accounts::site_link_by_id(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("site link {} vanished after insert", id))
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(link.into_model())))
}

/// PUT /profile/links/{id}: only the owner may edit.
pub async fn update_link(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(link_id): Path<i64>,
    Json(req): Json<SiteLinkRequest>,
) -> Result<Json<SiteLink>, ApiError> {
    validate_link(&req)?;

    let account_id = claims.sub;
    let link = with_db(&state, move |db| {
        db.with_conn(|conn| {
            let description = validation::non_empty(req.description.as_deref());
            let updated = accounts::update_site_link(
                conn,
                link_id,
                account_id,
                req.name.trim(),
                req.url.trim(),
                description.as_deref(),
            )
            .map_err(duplicate_url)?;
            if !updated {
                return Err(ApiError::NotFound("Site link not found".into()).into());
            }
            accounts::site_link_by_id(conn, link_id)?
                .ok_or_else(|| ApiError::NotFound("Site link not found".into()).into())
        })
    })
    .await?;

    Ok(Json(link.into_model()))
}

/// DELETE /profile/links/{id}
pub async fn delete_link(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(link_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let account_id = claims.sub;
    let deleted = with_db(&state, move |db| {
        db.with_conn(|conn| accounts::delete_site_link(conn, link_id, account_id))
    })
    .await?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Site link not found".into()))
    }
}

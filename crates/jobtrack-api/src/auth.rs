use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};

use jobtrack_db::{Connection, DbError};
use jobtrack_db::models::AccountRow;
use jobtrack_db::queries::accounts::{self, NewAccount, ProfileFields};
use jobtrack_types::api::{
    ActivationClaims, ActivationResponse, Claims, LoginRequest, LoginResponse, RegisterResponse,
};
use jobtrack_types::format::{capitalize_name, profile_picture_path};

use crate::error::{ApiError, FieldErrors};
use crate::mail::{Email, send_quietly};
use crate::state::{AppState, with_db};
use crate::upload::FormData;
use crate::validation;

pub const CUSTOMER_GROUP: &str = "Customer";
const ACTIVATE_PURPOSE: &str = "activate";
const SESSION_DAYS: i64 = 30;
const ACTIVATION_DAYS: i64 = 3;
const MIN_PASSWORD_LEN: usize = 8;

/// Registration form after field-level validation.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

impl Registration {
    /// Field checks that need no database access.
    pub fn from_form(form: &FormData) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let username = form.text("username").trim().to_string();
        validation::username(&mut errors, &username);

        let email = form.text("email").trim().to_string();
        validation::email(&mut errors, "email", &email);

        let password1 = form.text("password1");
        let password2 = form.text("password2");
        if validation::required(&mut errors, "password1", password1)
            && password1.chars().count() < MIN_PASSWORD_LEN
        {
            errors.add(
                "password1",
                format!(
                    "This password is too short. It must contain at least {MIN_PASSWORD_LEN} \
                     characters."
                ),
            );
        }
        if validation::required(&mut errors, "password2", password2) && password1 != password2 {
            errors.add("password2", "The two password fields didn't match.");
        }

        let first_name = capitalize_name(form.text("first_name"));
        let last_name = capitalize_name(form.text("last_name"));
        validation::max_len(&mut errors, "first_name", &first_name, 150);
        validation::max_len(&mut errors, "last_name", &last_name, 150);

        let phone_number = validation::phone(&mut errors, "phone_number", form.opt("phone_number"));
        let country = validation::non_empty(form.opt("country"));
        let city = validation::non_empty(form.opt("city"));
        validation::optional_text(&mut errors, "country", country.as_deref(), 20);
        validation::optional_text(&mut errors, "city", city.as_deref(), 20);

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            username,
            email,
            password: password1.to_string(),
            first_name,
            last_name,
            phone_number,
            country,
            city,
        })
    }
}

/// Record the case-insensitive uniqueness failures for username and e-mail.
pub fn check_available(
    conn: &Connection,
    username: &str,
    email: &str,
) -> anyhow::Result<FieldErrors> {
    let mut errors = FieldErrors::new();
    if accounts::username_taken(conn, username)? {
        errors.add("username", "A user with that username already exists.");
    }
    if accounts::email_taken(conn, email)? {
        errors.add("email", "A user with that email already exists.");
    }
    Ok(errors)
}

/// Insert an account, its profile and its `Customer` membership.
/// Meant to run inside a transaction.
pub fn insert_account_with_profile(
    conn: &Connection,
    account: &NewAccount<'_>,
    profile: &ProfileFields,
) -> anyhow::Result<i64> {
    let account_id = accounts::insert_account(conn, account).map_err(|e| {
        let taken = match e.downcast_ref::<DbError>() {
            Some(db) if db.is_unique_on("accounts.username") => {
                Some(("username", "A user with that username already exists."))
            }
            Some(db) if db.is_unique_on("accounts.email") => {
                Some(("email", "A user with that email already exists."))
            }
            _ => None,
        };
        match taken {
            Some((field, message)) => ApiError::field(field, message).into(),
            None => e,
        }
    })?;
    accounts::insert_profile(conn, account_id, profile)?;
    accounts::add_account_to_group(conn, account_id, CUSTOMER_GROUP)?;
    Ok(account_id)
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Unparseable password hash: {}", e);
            false
        }
    }
}

/// Validate, store the optional picture, then create the inactive account in
/// one transaction. A stored picture is removed again if the transaction fails.
pub async fn register_account(
    state: &AppState,
    mut form: FormData,
) -> Result<AccountRow, ApiError> {
    let picture = form.take_file("profile_picture");
    let local = Registration::from_form(&form);

    let username = form.text("username").trim().to_string();
    let email = form.text("email").trim().to_string();
    let taken = with_db(state, move |db| {
        db.with_conn(|conn| check_available(conn, &username, &email))
    })
    .await?;

    let reg = match local {
        Ok(reg) => {
            taken.into_result()?;
            reg
        }
        Err(mut errors) => {
            errors.merge(taken);
            return Err(ApiError::Validation(errors));
        }
    };

    let stored_picture = match picture {
        Some(file) => {
            let path = profile_picture_path(&reg.username, &file.file_name, chrono::Utc::now());
            Some(state.storage.save(&path, &file.data).await.map_err(ApiError::Internal)?)
        }
        None => None,
    };

    let picture_path = stored_picture.clone();
    let created = with_db(state, move |db| {
        let password_hash = hash_password(&reg.password)?;
        db.with_tx(|tx| {
            let account_id = insert_account_with_profile(
                tx,
                &NewAccount {
                    username: &reg.username,
                    email: &reg.email,
                    password_hash: &password_hash,
                    first_name: &reg.first_name,
                    last_name: &reg.last_name,
                    is_active: false,
                },
                &ProfileFields {
                    phone_number: reg.phone_number.clone(),
                    country: reg.country.clone(),
                    city: reg.city.clone(),
                    profile_picture: picture_path,
                },
            )?;
            accounts::account_by_id(tx, account_id)?
                .ok_or_else(|| anyhow::anyhow!("account {} vanished after insert", account_id))
        })
    })
    .await;

    match created {
        Ok(account) => {
            info!("Registered account {} ({})", account.username, account.id);
            Ok(account)
        }
        Err(e) => {
            if let Some(path) = stored_picture {
                if let Err(cleanup) = state.storage.delete_file(&path).await {
                    warn!("Failed to remove orphaned picture {}: {}", path, cleanup);
                }
            }
            Err(e)
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = FormData::read(multipart).await?;
    let account = register_account(&state, form).await?;

    let token = create_activation_token(&state.jwt_secret, account.id, &account.email)?;
    send_quietly(state.mailer.as_ref(), &activation_email(&state.public_url, &account, &token));

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            account_id: account.id,
            username: account.username,
            email: account.email,
            is_active: account.is_active,
        }),
    ))
}

pub fn activation_email(public_url: &str, account: &AccountRow, token: &str) -> Email {
    Email {
        to: account.email.clone(),
        subject: "Activate your account".to_string(),
        body: format!(
            "Hi {},\n\n\
             Please confirm your e-mail address by opening the link below:\n\n\
             {}/auth/activate/{}\n\n\
             The link expires in {} days.\n",
            account.username,
            public_url.trim_end_matches('/'),
            token,
            ACTIVATION_DAYS
        ),
    }
}

pub async fn activate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::BadRequest("Activation link is invalid or has expired.".into());
    let claims = decode_activation_token(&state.jwt_secret, &token).map_err(|_| invalid())?;

    let outcome = with_db(&state, move |db| {
        db.with_conn(|conn| {
            let Some(account) = accounts::account_by_id(conn, claims.sub)? else {
                return Ok(None);
            };
            // a changed address invalidates links sent to the old one
            if !account.email.eq_ignore_ascii_case(&claims.email) {
                return Ok(None);
            }
            let activated = accounts::activate_account(conn, account.id)?;
            Ok(Some((account, activated)))
        })
    })
    .await?;

    let (account, activated) = outcome.ok_or_else(invalid)?;
    if activated {
        info!("Activated account {} ({})", account.username, account.id);
    }
    Ok(Json(ActivationResponse {
        account_id: account.id,
        username: account.username,
        activated,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let login = req.login.trim().to_string();
    let account = with_db(&state, move |db| db.get_account_by_login(&login))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let hash = account.password.clone();
    let password = req.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    // Same response for a wrong password and an unactivated account.
    if !valid || !account.is_active {
        return Err(ApiError::Unauthorized);
    }

    let token = create_token(&state.jwt_secret, account.id, &account.username)?;

    Ok(Json(LoginResponse {
        account_id: account.id,
        username: account.username,
        token,
    }))
}

pub fn create_token(secret: &str, account_id: i64, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: account_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(SESSION_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn create_activation_token(
    secret: &str,
    account_id: i64,
    email: &str,
) -> anyhow::Result<String> {
    let claims = ActivationClaims {
        sub: account_id,
        email: email.to_string(),
        purpose: ACTIVATE_PURPOSE.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(ACTIVATION_DAYS)).timestamp() as usize,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn decode_activation_token(secret: &str, token: &str) -> anyhow::Result<ActivationClaims> {
    let data = decode::<ActivationClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    if data.claims.purpose != ACTIVATE_PURPOSE {
        anyhow::bail!("token purpose {:?} is not activation", data.claims.purpose);
    }
    Ok(data.claims)
}

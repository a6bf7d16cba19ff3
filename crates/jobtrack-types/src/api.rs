use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{
    Account, ApplicationDetail, ApplicationLink, ApplicationStatus, InterviewDetail,
    JobApplication, JobPosting, PostingApplicationStatus, Profile, Resume, SiteLink, WorkMode,
};

// -- JWT Claims --

/// Session token claims, issued at login and checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

/// Claims carried by the emailed activation link. `purpose` keeps a session
/// token from being replayed as an activation token and vice versa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationClaims {
    pub sub: i64,
    pub email: String,
    pub purpose: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub account_id: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct ActivationResponse {
    pub account_id: i64,
    pub username: String,
    /// `false` when the account was already active before this request.
    pub activated: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    /// Username or e-mail address.
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub account_id: i64,
    pub username: String,
    pub token: String,
}

// -- Profile --

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub account: Account,
    pub profile: Profile,
    pub site_links: Vec<SiteLink>,
}

/// Partial update: `None` keeps the stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteLinkRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

// -- Applications --

#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub application: JobApplication,
    pub detail: Option<ApplicationDetail>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationPage {
    pub items: Vec<JobApplication>,
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
    pub sort: String,
    pub order: String,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationListQuery {
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: ApplicationStatus,
}

/// One entry of the résumé selector on the new-application form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumeChoice {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct ApplicationFormInitial {
    pub country: Option<String>,
    pub city: Option<String>,
    pub apply_date: NaiveDate,
    pub status: ApplicationStatus,
}

#[derive(Debug, Serialize)]
pub struct ApplicationFormResponse {
    pub initial: ApplicationFormInitial,
    pub resume_choices: Vec<ResumeChoice>,
}

#[derive(Debug, Serialize)]
pub struct IntakeResponse {
    pub application: JobApplication,
    pub detail: ApplicationDetail,
    pub new_resume: Option<Resume>,
}

// -- Job postings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostingRequest {
    pub company_name: String,
    pub job_position: String,
    pub work_mode: WorkMode,
    pub work_location: String,
    pub termination_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplyToPostingRequest {
    pub resume_id: i64,
    #[serde(default)]
    pub status: PostingApplicationStatus,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateInterviewRequest {
    pub interview_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct PostingApplicationResponse {
    pub posting: JobPosting,
    pub link: ApplicationLink,
}

#[derive(Debug, Serialize)]
pub struct InterviewResponse {
    pub interview: InterviewDetail,
}

/// Flattened report: one row per application link, dot-joined column keys.
#[derive(Debug, Serialize)]
pub struct ApplicationsReport {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

//! Database row types. These map directly to SQLite rows and are converted
//! into `jobtrack-types` models at the edge with `into_model`.

use chrono::{NaiveDate, NaiveDateTime};
use jobtrack_types::format::format_phone;
use jobtrack_types::models::{
    Account, ApplicationDetail, ApplicationLink, ApplicationStatus, InterviewDetail,
    JobApplication, JobPosting, PostingApplicationStatus, Profile, Resume, SiteLink, WorkMode,
    valid_days,
};
use tracing::warn;

pub const ACCOUNTS: &str = "accounts";
pub const PROFILES: &str = "profiles";
pub const SITE_LINKS: &str = "site_links";
pub const RESUMES: &str = "resumes";
pub const JOB_APPLICATIONS: &str = "job_applications";
pub const APPLICATION_DETAILS: &str = "application_details";
pub const JOB_POSTINGS: &str = "job_postings";
pub const APPLICATIONS: &str = "applications";
pub const APPLICATION_LINKS: &str = "application_links";
pub const INTERVIEW_DETAILS: &str = "interview_details";

#[derive(Debug, Clone)]
pub struct AccountRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub date_joined: NaiveDateTime,
}

impl AccountRow {
    pub fn into_model(self) -> Account {
        Account {
            id: self.id,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            is_active: self.is_active,
            date_joined: self.date_joined,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileRow {
    pub id: i64,
    pub account_id: i64,
    pub phone_number: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub profile_picture: Option<String>,
}

impl ProfileRow {
    pub fn into_model(self) -> Profile {
        let phone_display = self
            .phone_number
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| format_phone(p, self.country.as_deref().unwrap_or_default()));
        Profile {
            id: self.id,
            account_id: self.account_id,
            phone_number: self.phone_number,
            phone_display,
            country: self.country,
            city: self.city,
            profile_picture: self.profile_picture,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteLinkRow {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
}

impl SiteLinkRow {
    pub fn into_model(self) -> SiteLink {
        SiteLink {
            id: self.id,
            account_id: self.account_id,
            name: self.name,
            url: self.url,
            description: self.description,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResumeRow {
    pub id: i64,
    pub account_id: i64,
    pub description: String,
    pub job_title: Option<String>,
    pub file_name: Option<String>,
    pub file: Option<String>,
    pub summary: Option<String>,
    pub category: String,
}

impl ResumeRow {
    pub fn into_model(self) -> Resume {
        Resume {
            id: self.id,
            account_id: self.account_id,
            description: self.description,
            job_title: self.job_title,
            file_name: self.file_name,
            file: self.file,
            summary: self.summary,
            category: self.category,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobApplicationRow {
    pub id: i64,
    pub job_name: String,
    pub company: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub apply_date: NaiveDate,
    pub valid_to: NaiveDate,
    pub portal: Option<String>,
    pub link: Option<String>,
    pub status: String,
}

impl JobApplicationRow {
    pub fn into_model(self, today: NaiveDate) -> JobApplication {
        let status = self.status.parse::<ApplicationStatus>().unwrap_or_else(|e| {
            warn!("Corrupt status on job application {}: {}", self.id, e);
            ApplicationStatus::default()
        });
        JobApplication {
            id: self.id,
            job_name: self.job_name,
            company: self.company,
            country: self.country,
            city: self.city,
            apply_date: self.apply_date,
            valid_days: valid_days(self.valid_to, today),
            valid_to: self.valid_to,
            portal: self.portal,
            link: self.link,
            status,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApplicationDetailRow {
    pub id: i64,
    pub job_application_id: i64,
    pub job_application_body: Option<String>,
    pub comments: Option<String>,
    pub salary_range: Option<String>,
}

impl ApplicationDetailRow {
    pub fn into_model(self, resumes: Vec<ResumeRow>) -> ApplicationDetail {
        ApplicationDetail {
            id: self.id,
            job_application_id: self.job_application_id,
            job_application_body: self.job_application_body,
            comments: self.comments,
            salary_range: self.salary_range,
            resumes: resumes.into_iter().map(ResumeRow::into_model).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobPostingRow {
    pub id: i64,
    pub company_name: String,
    pub job_position: String,
    pub work_mode: String,
    pub work_location: String,
    pub termination_date: NaiveDate,
}

impl JobPostingRow {
    pub fn into_model(self) -> JobPosting {
        let work_mode = self.work_mode.parse::<WorkMode>().unwrap_or_else(|e| {
            warn!("Corrupt work_mode on job posting {}: {}", self.id, e);
            WorkMode::Onsite
        });
        JobPosting {
            id: self.id,
            company_name: self.company_name,
            job_position: self.job_position,
            work_mode,
            work_location: self.work_location,
            termination_date: self.termination_date,
        }
    }
}

/// An application made against a job posting (the `applications` table).
#[derive(Debug, Clone)]
pub struct PostingApplicationRow {
    pub id: i64,
    pub resume_id: i64,
    pub application_status: String,
}

#[derive(Debug, Clone)]
pub struct ApplicationLinkRow {
    pub id: i64,
    pub account_id: i64,
    pub job_posting_id: i64,
    pub application_id: i64,
}

impl ApplicationLinkRow {
    pub fn into_model(self, application: PostingApplicationRow) -> ApplicationLink {
        let application_status = application
            .application_status
            .parse::<PostingApplicationStatus>()
            .unwrap_or_else(|e| {
                warn!("Corrupt status on application {}: {}", application.id, e);
                PostingApplicationStatus::default()
            });
        ApplicationLink {
            id: self.id,
            account_id: self.account_id,
            job_posting_id: self.job_posting_id,
            application_id: self.application_id,
            resume_id: application.resume_id,
            application_status,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InterviewDetailRow {
    pub id: i64,
    pub application_id: i64,
    pub interview_date: NaiveDate,
}

impl InterviewDetailRow {
    pub fn into_model(self) -> InterviewDetail {
        InterviewDetail {
            id: self.id,
            application_id: self.application_id,
            interview_date: self.interview_date,
        }
    }
}

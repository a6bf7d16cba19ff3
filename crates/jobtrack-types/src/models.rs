use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Lifecycle of a tracked job application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Interview,
    Offer,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 4] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Interview,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Interview => "interview",
            Self::Offer => "offer",
            Self::Rejected => "rejected",
        }
    }
}

/// Status of an application made against a [`JobPosting`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostingApplicationStatus {
    #[default]
    Pending,
    Interview,
    Rejected,
    Success,
}

impl PostingApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Interview => "interview",
            Self::Rejected => "rejected",
            Self::Success => "success",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkMode {
    Onsite,
    Remote,
    Hybrid,
}

impl WorkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onsite => "onsite",
            Self::Remote => "remote",
            Self::Hybrid => "hybrid",
        }
    }
}

/// Returned when a stored or submitted choice is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChoice(pub String);

impl fmt::Display for UnknownChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Select a valid choice. {} is not one of the available choices.", self.0)
    }
}

impl std::error::Error for UnknownChoice {}

macro_rules! choice_from_str {
    ($ty:ty, $($text:literal => $variant:expr),+ $(,)?) => {
        impl FromStr for $ty {
            type Err = UnknownChoice;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($variant),)+
                    other => Err(UnknownChoice(other.to_string())),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

choice_from_str!(ApplicationStatus,
    "applied" => ApplicationStatus::Applied,
    "interview" => ApplicationStatus::Interview,
    "offer" => ApplicationStatus::Offer,
    "rejected" => ApplicationStatus::Rejected,
);

choice_from_str!(PostingApplicationStatus,
    "pending" => PostingApplicationStatus::Pending,
    "interview" => PostingApplicationStatus::Interview,
    "rejected" => PostingApplicationStatus::Rejected,
    "success" => PostingApplicationStatus::Success,
);

choice_from_str!(WorkMode,
    "onsite" => WorkMode::Onsite,
    "remote" => WorkMode::Remote,
    "hybrid" => WorkMode::Hybrid,
);

/// Days left until `valid_to`, never negative.
pub fn valid_days(valid_to: NaiveDate, today: NaiveDate) -> i64 {
    (valid_to - today).num_days().max(0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub date_joined: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub account_id: i64,
    pub phone_number: Option<String>,
    /// `phone_number` grouped for display according to `country`.
    pub phone_display: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteLink {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resume {
    pub id: i64,
    pub account_id: i64,
    pub description: String,
    pub job_title: Option<String>,
    pub file_name: Option<String>,
    pub file: Option<String>,
    pub summary: Option<String>,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: i64,
    pub job_name: String,
    pub company: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub apply_date: NaiveDate,
    pub valid_to: NaiveDate,
    pub portal: Option<String>,
    pub link: Option<String>,
    pub status: ApplicationStatus,
    pub valid_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationDetail {
    pub id: i64,
    pub job_application_id: i64,
    pub job_application_body: Option<String>,
    pub comments: Option<String>,
    pub salary_range: Option<String>,
    pub resumes: Vec<Resume>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: i64,
    pub company_name: String,
    pub job_position: String,
    pub work_mode: WorkMode,
    pub work_location: String,
    pub termination_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationLink {
    pub id: i64,
    pub account_id: i64,
    pub job_posting_id: i64,
    pub application_id: i64,
    pub resume_id: i64,
    pub application_status: PostingApplicationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewDetail {
    pub id: i64,
    pub application_id: i64,
    pub interview_date: NaiveDate,
}

use anyhow::Result;
use chrono::NaiveDate;
use jobtrack_types::models::{PostingApplicationStatus, WorkMode};
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::map_constraint;
use crate::models::{ApplicationLinkRow, InterviewDetailRow, JobPostingRow, PostingApplicationRow};

#[derive(Debug, Clone)]
pub struct NewJobPosting {
    pub company_name: String,
    pub job_position: String,
    pub work_mode: WorkMode,
    pub work_location: String,
    pub termination_date: NaiveDate,
}

fn row_to_posting(row: &Row) -> rusqlite::Result<JobPostingRow> {
    Ok(JobPostingRow {
        id: row.get(0)?,
        company_name: row.get(1)?,
        job_position: row.get(2)?,
        work_mode: row.get(3)?,
        work_location: row.get(4)?,
        termination_date: row.get(5)?,
    })
}

fn row_to_link(row: &Row) -> rusqlite::Result<ApplicationLinkRow> {
    Ok(ApplicationLinkRow {
        id: row.get(0)?,
        account_id: row.get(1)?,
        job_posting_id: row.get(2)?,
        application_id: row.get(3)?,
    })
}

pub fn insert_posting(conn: &Connection, posting: &NewJobPosting) -> Result<i64> {
    conn.execute(
        "INSERT INTO job_postings
             (company_name, job_position, work_mode, work_location, termination_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            posting.company_name,
            posting.job_position,
            posting.work_mode.as_str(),
            posting.work_location,
            posting.termination_date
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn posting_by_id(conn: &Connection, id: i64) -> Result<Option<JobPostingRow>> {
    conn.query_row(
        "SELECT id, company_name, job_position, work_mode, work_location, termination_date
         FROM job_postings WHERE id = ?1",
        [id],
        row_to_posting,
    )
    .optional()
}

/// Postings that have not yet passed their termination date, soonest first.
pub fn open_postings(conn: &Connection, today: NaiveDate) -> Result<Vec<JobPostingRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, company_name, job_position, work_mode, work_location, termination_date
         FROM job_postings WHERE termination_date >= ?1
         ORDER BY termination_date, id",
    )?;
    let rows = stmt
        .query_map([today], row_to_posting)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_posting_application(
    conn: &Connection,
    resume_id: i64,
    status: PostingApplicationStatus,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO applications (resume_id, application_status) VALUES (?1, ?2)",
        params![resume_id, status.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn posting_application_by_id(
    conn: &Connection,
    id: i64,
) -> Result<Option<PostingApplicationRow>> {
    conn.query_row(
        "SELECT id, resume_id, application_status FROM applications WHERE id = ?1",
        [id],
        |row| {
            Ok(PostingApplicationRow {
                id: row.get(0)?,
                resume_id: row.get(1)?,
                application_status: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Fails with a unique violation on `application_links.account_id,
/// application_links.job_posting_id` when the account already applied.
pub fn insert_application_link(
    conn: &Connection,
    account_id: i64,
    job_posting_id: i64,
    application_id: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO application_links (account_id, job_posting_id, application_id)
         VALUES (?1, ?2, ?3)",
        params![account_id, job_posting_id, application_id],
    )
    .map_err(map_constraint)?;
    Ok(conn.last_insert_rowid())
}

pub fn link_by_id(conn: &Connection, id: i64) -> Result<Option<ApplicationLinkRow>> {
    conn.query_row(
        "SELECT id, account_id, job_posting_id, application_id
         FROM application_links WHERE id = ?1",
        [id],
        row_to_link,
    )
    .optional()
}

pub fn link_for_account(
    conn: &Connection,
    id: i64,
    account_id: i64,
) -> Result<Option<ApplicationLinkRow>> {
    conn.query_row(
        "SELECT id, account_id, job_posting_id, application_id FROM application_links
         WHERE id = ?1 AND account_id = ?2",
        params![id, account_id],
        row_to_link,
    )
    .optional()
}

pub fn links_for_account(conn: &Connection, account_id: i64) -> Result<Vec<ApplicationLinkRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, job_posting_id, application_id FROM application_links
         WHERE account_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([account_id], row_to_link)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_interview(conn: &Connection, application_id: i64, date: NaiveDate) -> Result<i64> {
    conn.execute(
        "INSERT INTO interview_details (application_id, interview_date) VALUES (?1, ?2)",
        params![application_id, date],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn interview_by_id(conn: &Connection, id: i64) -> Result<Option<InterviewDetailRow>> {
    conn.query_row(
        "SELECT id, application_id, interview_date FROM interview_details WHERE id = ?1",
        [id],
        |row| {
            Ok(InterviewDetailRow {
                id: row.get(0)?,
                application_id: row.get(1)?,
                interview_date: row.get(2)?,
            })
        },
    )
    .optional()
}

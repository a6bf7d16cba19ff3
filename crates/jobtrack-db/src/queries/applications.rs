use anyhow::Result;
use chrono::NaiveDate;
use jobtrack_types::models::ApplicationStatus;
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use super::resumes::row_to_resume;
use crate::map_constraint;
use crate::models::{ApplicationDetailRow, JobApplicationRow, ResumeRow};

const APPLICATION_COLUMNS: &str = "ja.id, ja.job_name, ja.company, ja.country, ja.city, \
     ja.apply_date, ja.valid_to, ja.portal, ja.link, ja.status";

#[derive(Debug, Clone)]
pub struct NewJobApplication {
    pub job_name: String,
    pub company: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub apply_date: NaiveDate,
    pub valid_to: NaiveDate,
    pub portal: Option<String>,
    pub link: Option<String>,
    pub status: ApplicationStatus,
}

#[derive(Debug, Default, Clone)]
pub struct NewApplicationDetail {
    pub job_application_body: Option<String>,
    pub comments: Option<String>,
    pub salary_range: Option<String>,
}

/// Columns the application list may be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplicationSort {
    #[default]
    ApplyDate,
    ValidTo,
    Company,
    JobName,
    Status,
}

impl ApplicationSort {
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "apply_date" => Some(Self::ApplyDate),
            "valid_to" => Some(Self::ValidTo),
            "company" => Some(Self::Company),
            "job_name" => Some(Self::JobName),
            "status" => Some(Self::Status),
            _ => None,
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            Self::ApplyDate => "apply_date",
            Self::ValidTo => "valid_to",
            Self::Company => "company",
            Self::JobName => "job_name",
            Self::Status => "status",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::ApplyDate => "ja.apply_date",
            Self::ValidTo => "ja.valid_to",
            Self::Company => "ja.company COLLATE NOCASE",
            Self::JobName => "ja.job_name COLLATE NOCASE",
            Self::Status => "ja.status",
        }
    }
}

fn row_to_application(row: &Row) -> rusqlite::Result<JobApplicationRow> {
    Ok(JobApplicationRow {
        id: row.get(0)?,
        job_name: row.get(1)?,
        company: row.get(2)?,
        country: row.get(3)?,
        city: row.get(4)?,
        apply_date: row.get(5)?,
        valid_to: row.get(6)?,
        portal: row.get(7)?,
        link: row.get(8)?,
        status: row.get(9)?,
    })
}

fn row_to_detail(row: &Row) -> rusqlite::Result<ApplicationDetailRow> {
    Ok(ApplicationDetailRow {
        id: row.get(0)?,
        job_application_id: row.get(1)?,
        job_application_body: row.get(2)?,
        comments: row.get(3)?,
        salary_range: row.get(4)?,
    })
}

pub fn insert_job_application(conn: &Connection, app: &NewJobApplication) -> Result<i64> {
    conn.execute(
        "INSERT INTO job_applications
            (job_name, company, country, city, apply_date, valid_to, portal, link, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            app.job_name,
            app.company,
            app.country,
            app.city,
            app.apply_date,
            app.valid_to,
            app.portal,
            app.link,
            app.status.as_str()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn add_account_to_application(
    conn: &Connection,
    job_application_id: i64,
    account_id: i64,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO job_application_accounts (job_application_id, account_id)
         VALUES (?1, ?2)",
        params![job_application_id, account_id],
    )?;
    Ok(())
}

pub fn insert_application_detail(
    conn: &Connection,
    job_application_id: i64,
    detail: &NewApplicationDetail,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO application_details
            (job_application_id, job_application_body, comments, salary_range)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            job_application_id,
            detail.job_application_body,
            detail.comments,
            detail.salary_range
        ],
    )
    .map_err(map_constraint)?;
    Ok(conn.last_insert_rowid())
}

pub fn attach_resume_to_detail(conn: &Connection, detail_id: i64, resume_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO application_detail_resumes (application_detail_id, resume_id)
         VALUES (?1, ?2)",
        params![detail_id, resume_id],
    )?;
    Ok(())
}

pub fn job_application_by_id(conn: &Connection, id: i64) -> Result<Option<JobApplicationRow>> {
    conn.query_row(
        &format!("SELECT {APPLICATION_COLUMNS} FROM job_applications ja WHERE ja.id = ?1"),
        [id],
        row_to_application,
    )
    .optional()
}

/// The application, only if `account_id` is one of its associated accounts.
pub fn application_for_account(
    conn: &Connection,
    id: i64,
    account_id: i64,
) -> Result<Option<JobApplicationRow>> {
    conn.query_row(
        &format!(
            "SELECT {APPLICATION_COLUMNS} FROM job_applications ja
             JOIN job_application_accounts jaa ON jaa.job_application_id = ja.id
             WHERE ja.id = ?1 AND jaa.account_id = ?2"
        ),
        params![id, account_id],
        row_to_application,
    )
    .optional()
}

pub fn applications_for_account(
    conn: &Connection,
    account_id: i64,
    sort: ApplicationSort,
    descending: bool,
    limit: u32,
    offset: u32,
) -> Result<Vec<JobApplicationRow>> {
    let direction = if descending { "DESC" } else { "ASC" };
    let sql = format!(
        "SELECT {APPLICATION_COLUMNS} FROM job_applications ja
         JOIN job_application_accounts jaa ON jaa.job_application_id = ja.id
         WHERE jaa.account_id = ?1
         ORDER BY {column} {direction}, ja.id {direction}
         LIMIT ?2 OFFSET ?3",
        column = sort.column(),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![account_id, limit, offset], row_to_application)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_applications_for_account(conn: &Connection, account_id: i64) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM job_application_accounts WHERE account_id = ?1",
        [account_id],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

pub fn update_application_status(
    conn: &Connection,
    id: i64,
    account_id: i64,
    status: ApplicationStatus,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE job_applications SET status = ?1
         WHERE id = ?2
           AND id IN (SELECT job_application_id FROM job_application_accounts
                      WHERE account_id = ?3)",
        params![status.as_str(), id, account_id],
    )?;
    Ok(changed > 0)
}

pub fn detail_by_id(conn: &Connection, id: i64) -> Result<Option<ApplicationDetailRow>> {
    conn.query_row(
        "SELECT id, job_application_id, job_application_body, comments, salary_range
         FROM application_details WHERE id = ?1",
        [id],
        row_to_detail,
    )
    .optional()
}

pub fn detail_for_application(
    conn: &Connection,
    job_application_id: i64,
) -> Result<Option<ApplicationDetailRow>> {
    conn.query_row(
        "SELECT id, job_application_id, job_application_body, comments, salary_range
         FROM application_details WHERE job_application_id = ?1",
        [job_application_id],
        row_to_detail,
    )
    .optional()
}

pub fn resumes_for_detail(conn: &Connection, detail_id: i64) -> Result<Vec<ResumeRow>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.account_id, r.description, r.job_title, r.file_name, r.file,
                r.summary, r.category
         FROM resumes r
         JOIN application_detail_resumes adr ON adr.resume_id = r.id
         WHERE adr.application_detail_id = ?1
         ORDER BY r.id",
    )?;
    let rows = stmt
        .query_map([detail_id], row_to_resume)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::queries::fixtures;

    fn application(company: &str, apply_date: (i32, u32, u32)) -> NewJobApplication {
        let (y, m, d) = apply_date;
        NewJobApplication {
            job_name: "Rust Developer".to_string(),
            company: company.to_string(),
            country: Some("Poland".to_string()),
            city: Some("Kraków".to_string()),
            apply_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            valid_to: NaiveDate::from_ymd_opt(y, m + 1, d).unwrap(),
            portal: None,
            link: None,
            status: ApplicationStatus::Applied,
        }
    }

    #[test]
    fn listing_is_scoped_sorted_and_paged() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let jan = fixtures::account(conn, "jan");
            let anna = fixtures::account(conn, "anna");
            let dated = [
                ("Acme", (2025, 1, 5)),
                ("Globex", (2025, 3, 1)),
                ("Initech", (2025, 2, 10)),
            ];
            for (company, date) in dated {
                let id = insert_job_application(conn, &application(company, date))?;
                add_account_to_application(conn, id, jan)?;
            }
            let other = insert_job_application(conn, &application("Hooli", (2025, 4, 1)))?;
            add_account_to_application(conn, other, anna)?;

            let newest_first =
                applications_for_account(conn, jan, ApplicationSort::ApplyDate, true, 20, 0)?;
            let companies: Vec<_> = newest_first.iter().map(|a| a.company.as_str()).collect();
            assert_eq!(companies, vec!["Globex", "Initech", "Acme"]);

            let by_company =
                applications_for_account(conn, jan, ApplicationSort::Company, false, 2, 1)?;
            let companies: Vec<_> = by_company.iter().map(|a| a.company.as_str()).collect();
            assert_eq!(companies, vec!["Globex", "Initech"]);

            assert_eq!(count_applications_for_account(conn, jan)?, 3);
            assert!(application_for_account(conn, other, jan)?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn one_detail_per_application() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .with_conn(|conn| {
                let id = insert_job_application(conn, &application("Acme", (2025, 1, 5)))?;
                insert_application_detail(conn, id, &NewApplicationDetail::default())?;
                insert_application_detail(conn, id, &NewApplicationDetail::default())?;
                Ok(())
            })
            .unwrap_err();
        assert!(err.downcast_ref::<crate::DbError>().is_some());
    }

    #[test]
    fn status_update_requires_association() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let jan = fixtures::account(conn, "jan");
            let anna = fixtures::account(conn, "anna");
            let id = insert_job_application(conn, &application("Acme", (2025, 1, 5)))?;
            add_account_to_application(conn, id, jan)?;

            assert!(!update_application_status(conn, id, anna, ApplicationStatus::Offer)?);
            assert!(update_application_status(conn, id, jan, ApplicationStatus::Offer)?);
            assert_eq!(job_application_by_id(conn, id)?.unwrap().status, "offer");
            Ok(())
        })
        .unwrap();
    }
}

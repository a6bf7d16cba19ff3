use anyhow::Result;
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::models::ResumeRow;

const RESUME_COLUMNS: &str =
    "id, account_id, description, job_title, file_name, file, summary, category";

#[derive(Debug, Default, Clone)]
pub struct NewResume {
    pub account_id: i64,
    pub description: String,
    pub job_title: Option<String>,
    pub file_name: Option<String>,
    pub file: Option<String>,
    pub summary: Option<String>,
    pub category: String,
}

pub(crate) fn row_to_resume(row: &Row) -> rusqlite::Result<ResumeRow> {
    Ok(ResumeRow {
        id: row.get(0)?,
        account_id: row.get(1)?,
        description: row.get(2)?,
        job_title: row.get(3)?,
        file_name: row.get(4)?,
        file: row.get(5)?,
        summary: row.get(6)?,
        category: row.get(7)?,
    })
}

pub fn insert_resume(conn: &Connection, resume: &NewResume) -> Result<i64> {
    conn.execute(
        "INSERT INTO resumes
             (account_id, description, job_title, file_name, file, summary, category)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            resume.account_id,
            resume.description,
            resume.job_title,
            resume.file_name,
            resume.file,
            resume.summary,
            resume.category
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn resume_by_id(conn: &Connection, id: i64) -> Result<Option<ResumeRow>> {
    conn.query_row(
        &format!("SELECT {RESUME_COLUMNS} FROM resumes WHERE id = ?1"),
        [id],
        row_to_resume,
    )
    .optional()
}

/// Fetch a résumé only if it belongs to `account_id`. A résumé owned by
/// someone else is indistinguishable from a missing one.
pub fn resume_for_account(
    conn: &Connection,
    id: i64,
    account_id: i64,
) -> Result<Option<ResumeRow>> {
    conn.query_row(
        &format!("SELECT {RESUME_COLUMNS} FROM resumes WHERE id = ?1 AND account_id = ?2"),
        params![id, account_id],
        row_to_resume,
    )
    .optional()
}

pub fn resumes_for_account(conn: &Connection, account_id: i64) -> Result<Vec<ResumeRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RESUME_COLUMNS} FROM resumes WHERE account_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([account_id], row_to_resume)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Owner-scoped delete, returning the removed row so its file can be cleaned up.
pub fn delete_resume(conn: &Connection, id: i64, account_id: i64) -> Result<Option<ResumeRow>> {
    let Some(row) = resume_for_account(conn, id, account_id)? else {
        return Ok(None);
    };
    conn.execute(
        "DELETE FROM resumes WHERE id = ?1 AND account_id = ?2",
        params![id, account_id],
    )?;
    Ok(Some(row))
}

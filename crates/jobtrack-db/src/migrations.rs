use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (accounts, résumés, job applications)");
        conn.execute_batch(
            "
            CREATE TABLE accounts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                first_name  TEXT NOT NULL DEFAULT '',
                last_name   TEXT NOT NULL DEFAULT '',
                is_active   INTEGER NOT NULL DEFAULT 0,
                date_joined TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE groups (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE account_groups (
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                group_id   INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                PRIMARY KEY (account_id, group_id)
            );

            CREATE TABLE profiles (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id      INTEGER NOT NULL UNIQUE REFERENCES accounts(id) ON DELETE CASCADE,
                phone_number    TEXT,
                country         TEXT,
                city            TEXT,
                profile_picture TEXT
            );

            CREATE TABLE site_links (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id  INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                url         TEXT NOT NULL UNIQUE,
                description TEXT
            );

            CREATE INDEX idx_site_links_account ON site_links(account_id);

            CREATE TABLE resumes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id  INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                description TEXT NOT NULL,
                job_title   TEXT,
                file_name   TEXT DEFAULT '',
                file        TEXT,
                summary     TEXT,
                category    TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX idx_resumes_account ON resumes(account_id);

            CREATE TABLE job_applications (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                job_name   TEXT NOT NULL,
                company    TEXT NOT NULL,
                country    TEXT,
                city       TEXT,
                apply_date TEXT NOT NULL,
                valid_to   TEXT NOT NULL,
                portal     TEXT,
                link       TEXT,
                status     TEXT NOT NULL DEFAULT 'applied'
                           CHECK (status IN ('applied', 'interview', 'offer', 'rejected'))
            );

            CREATE TABLE job_application_accounts (
                job_application_id INTEGER NOT NULL
                                   REFERENCES job_applications(id) ON DELETE CASCADE,
                account_id         INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                PRIMARY KEY (job_application_id, account_id)
            );

            CREATE INDEX idx_job_application_accounts_account
                ON job_application_accounts(account_id);

            CREATE TABLE application_details (
                id                   INTEGER PRIMARY KEY AUTOINCREMENT,
                job_application_id   INTEGER NOT NULL UNIQUE
                                     REFERENCES job_applications(id) ON DELETE CASCADE,
                job_application_body TEXT,
                comments             TEXT,
                salary_range         TEXT
            );

            CREATE TABLE application_detail_resumes (
                application_detail_id INTEGER NOT NULL
                                      REFERENCES application_details(id) ON DELETE CASCADE,
                resume_id             INTEGER NOT NULL REFERENCES resumes(id) ON DELETE CASCADE,
                PRIMARY KEY (application_detail_id, resume_id)
            );

            INSERT INTO groups (name) VALUES ('Customer');

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (job postings, application links, interviews)");
        conn.execute_batch(
            "
            CREATE TABLE job_postings (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                company_name     TEXT NOT NULL,
                job_position     TEXT NOT NULL,
                work_mode        TEXT NOT NULL CHECK (work_mode IN ('onsite', 'remote', 'hybrid')),
                work_location    TEXT NOT NULL,
                termination_date TEXT NOT NULL
            );

            CREATE TABLE applications (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                resume_id          INTEGER NOT NULL REFERENCES resumes(id) ON DELETE CASCADE,
                application_status TEXT NOT NULL DEFAULT 'pending'
                                   CHECK (application_status IN
                                          ('pending', 'interview', 'rejected', 'success'))
            );

            CREATE TABLE application_links (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id     INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                job_posting_id INTEGER NOT NULL REFERENCES job_postings(id) ON DELETE CASCADE,
                application_id INTEGER NOT NULL UNIQUE
                               REFERENCES applications(id) ON DELETE CASCADE,
                UNIQUE (account_id, job_posting_id)
            );

            CREATE TABLE interview_details (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                application_id INTEGER NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
                interview_date TEXT NOT NULL
            );

            CREATE INDEX idx_interview_details_application ON interview_details(application_id);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

use anyhow::Result;
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::map_constraint;
use crate::models::{AccountRow, ProfileRow, SiteLinkRow};
use crate::Database;

const ACCOUNT_COLUMNS: &str =
    "id, username, password, email, first_name, last_name, is_active, date_joined";

pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub is_active: bool,
}

#[derive(Debug, Default, Clone)]
pub struct ProfileFields {
    pub phone_number: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub profile_picture: Option<String>,
}

// -- Accounts --

pub fn insert_account(conn: &Connection, account: &NewAccount<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO accounts (username, email, password, first_name, last_name, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            account.username,
            account.email,
            account.password_hash,
            account.first_name,
            account.last_name,
            account.is_active
        ],
    )
    .map_err(map_constraint)?;
    Ok(conn.last_insert_rowid())
}

fn row_to_account(row: &Row) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        email: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        is_active: row.get(6)?,
        date_joined: row.get(7)?,
    })
}

pub fn account_by_id(conn: &Connection, id: i64) -> Result<Option<AccountRow>> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        [id],
        row_to_account,
    )
    .optional()
}

/// `(id, username)` of every account, oldest first.
pub fn account_usernames(conn: &Connection) -> Result<Vec<(i64, String)>> {
    let mut stmt = conn.prepare("SELECT id, username FROM accounts ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Look an account up by username or e-mail, both case-insensitively.
pub fn account_by_login(conn: &Connection, login: &str) -> Result<Option<AccountRow>> {
    conn.query_row(
        &format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
             WHERE username = ?1 COLLATE NOCASE OR email = ?1 COLLATE NOCASE
             ORDER BY username = ?1 COLLATE NOCASE DESC
             LIMIT 1"
        ),
        [login],
        row_to_account,
    )
    .optional()
}

pub fn username_taken(conn: &Connection, username: &str) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM accounts WHERE username = ?1 COLLATE NOCASE",
        [username],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

pub fn email_taken(conn: &Connection, email: &str) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM accounts WHERE email = ?1 COLLATE NOCASE",
        [email],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

/// Returns `true` when the account went from inactive to active.
pub fn activate_account(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE accounts SET is_active = 1 WHERE id = ?1 AND is_active = 0",
        [id],
    )?;
    Ok(changed > 0)
}

pub fn update_account_names(
    conn: &Connection,
    id: i64,
    first_name: &str,
    last_name: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET first_name = ?1, last_name = ?2 WHERE id = ?3",
        params![first_name, last_name, id],
    )?;
    Ok(())
}

pub fn add_account_to_group(conn: &Connection, account_id: i64, group: &str) -> Result<()> {
    conn.execute("INSERT OR IGNORE INTO groups (name) VALUES (?1)", [group])?;
    conn.execute(
        "INSERT OR IGNORE INTO account_groups (account_id, group_id)
         SELECT ?1, id FROM groups WHERE name = ?2",
        params![account_id, group],
    )?;
    Ok(())
}

pub fn account_groups(conn: &Connection, account_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT g.name FROM groups g
         JOIN account_groups ag ON ag.group_id = g.id
         WHERE ag.account_id = ?1
         ORDER BY g.name",
    )?;
    let names = stmt
        .query_map([account_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

// -- Profiles --

pub fn insert_profile(conn: &Connection, account_id: i64, fields: &ProfileFields) -> Result<i64> {
    conn.execute(
        "INSERT INTO profiles (account_id, phone_number, country, city, profile_picture)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            account_id,
            fields.phone_number,
            fields.country,
            fields.city,
            fields.profile_picture
        ],
    )
    .map_err(map_constraint)?;
    Ok(conn.last_insert_rowid())
}

fn row_to_profile(row: &Row) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        account_id: row.get(1)?,
        phone_number: row.get(2)?,
        country: row.get(3)?,
        city: row.get(4)?,
        profile_picture: row.get(5)?,
    })
}

pub fn profile_by_account(conn: &Connection, account_id: i64) -> Result<Option<ProfileRow>> {
    conn.query_row(
        "SELECT id, account_id, phone_number, country, city, profile_picture
         FROM profiles WHERE account_id = ?1",
        [account_id],
        row_to_profile,
    )
    .optional()
}

pub fn profile_by_id(conn: &Connection, id: i64) -> Result<Option<ProfileRow>> {
    conn.query_row(
        "SELECT id, account_id, phone_number, country, city, profile_picture
         FROM profiles WHERE id = ?1",
        [id],
        row_to_profile,
    )
    .optional()
}

/// Overwrite contact fields; the picture is managed by [`set_profile_picture`].
pub fn update_profile(conn: &Connection, account_id: i64, fields: &ProfileFields) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET phone_number = ?1, country = ?2, city = ?3 WHERE account_id = ?4",
        params![fields.phone_number, fields.country, fields.city, account_id],
    )?;
    Ok(())
}

/// Returns the previous picture path, if any, so the caller can remove it.
pub fn set_profile_picture(
    conn: &Connection,
    account_id: i64,
    path: &str,
) -> Result<Option<String>> {
    let previous: Option<String> = conn
        .query_row(
            "SELECT profile_picture FROM profiles WHERE account_id = ?1",
            [account_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?
        .flatten();
    conn.execute(
        "UPDATE profiles SET profile_picture = ?1 WHERE account_id = ?2",
        params![path, account_id],
    )?;
    Ok(previous)
}

// -- Site links --

fn row_to_site_link(row: &Row) -> rusqlite::Result<SiteLinkRow> {
    Ok(SiteLinkRow {
        id: row.get(0)?,
        account_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        description: row.get(4)?,
    })
}

pub fn insert_site_link(
    conn: &Connection,
    account_id: i64,
    name: &str,
    url: &str,
    description: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO site_links (account_id, name, url, description) VALUES (?1, ?2, ?3, ?4)",
        params![account_id, name, url, description],
    )
    .map_err(map_constraint)?;
    Ok(conn.last_insert_rowid())
}

/// Owner-scoped update. Returns `false` when no link with that id belongs to the account.
pub fn update_site_link(
    conn: &Connection,
    id: i64,
    account_id: i64,
    name: &str,
    url: &str,
    description: Option<&str>,
) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE site_links SET name = ?1, url = ?2, description = ?3
             WHERE id = ?4 AND account_id = ?5",
            params![name, url, description, id, account_id],
        )
        .map_err(map_constraint)?;
    Ok(changed > 0)
}

pub fn delete_site_link(conn: &Connection, id: i64, account_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM site_links WHERE id = ?1 AND account_id = ?2",
        params![id, account_id],
    )?;
    Ok(changed > 0)
}

pub fn site_link_by_id(conn: &Connection, id: i64) -> Result<Option<SiteLinkRow>> {
    conn.query_row(
        "SELECT id, account_id, name, url, description FROM site_links WHERE id = ?1",
        [id],
        row_to_site_link,
    )
    .optional()
}

pub fn site_links_for_account(conn: &Connection, account_id: i64) -> Result<Vec<SiteLinkRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, name, url, description FROM site_links
         WHERE account_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([account_id], row_to_site_link)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Database {
    pub fn get_account(&self, id: i64) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| account_by_id(conn, id))
    }

    pub fn get_account_by_login(&self, login: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| account_by_login(conn, login))
    }

    pub fn get_profile(&self, account_id: i64) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| profile_by_account(conn, account_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;
    use crate::DbError;

    #[test]
    fn usernames_are_listed_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            assert!(account_usernames(conn)?.is_empty());
            let jan = fixtures::account(conn, "jan");
            let anna = fixtures::account(conn, "anna");
            assert_eq!(
                account_usernames(conn)?,
                vec![(jan, "jan".to_string()), (anna, "anna".to_string())]
            );
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn usernames_and_emails_are_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            fixtures::account(conn, "jan");
            assert!(username_taken(conn, "JAN")?);
            assert!(email_taken(conn, "Jan@Example.com")?);
            assert!(!username_taken(conn, "anna")?);

            let found = account_by_login(conn, "JAN@example.COM")?.unwrap();
            assert_eq!(found.username, "jan");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn one_profile_per_account() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .with_conn(|conn| {
                let id = fixtures::account(conn, "jan");
                insert_profile(conn, id, &ProfileFields::default())?;
                insert_profile(conn, id, &ProfileFields::default())?;
                Ok(())
            })
            .unwrap_err();
        let db_err = err.downcast_ref::<DbError>().unwrap();
        assert!(db_err.is_unique_on("profiles.account_id"));
    }

    #[test]
    fn site_link_url_is_globally_unique() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .with_conn(|conn| {
                let jan = fixtures::account(conn, "jan");
                let anna = fixtures::account(conn, "anna");
                insert_site_link(conn, jan, "GitHub", "https://github.com/jan", None)?;
                insert_site_link(conn, anna, "Mirror", "https://github.com/jan", None)?;
                Ok(())
            })
            .unwrap_err();
        assert!(err.downcast_ref::<DbError>().unwrap().is_unique_on("site_links.url"));

        let count = db
            .with_conn(|conn| {
                Ok(site_links_for_account(conn, 1)?.len() + site_links_for_account(conn, 2)?.len())
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn site_link_edits_are_owner_scoped() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let jan = fixtures::account(conn, "jan");
            let anna = fixtures::account(conn, "anna");
            let link =
                insert_site_link(conn, jan, "GitHub", "https://github.com/jan", Some("code"))?;

            assert!(!update_site_link(conn, link, anna, "x", "https://x.example", None)?);
            assert!(!delete_site_link(conn, link, anna)?);
            assert!(update_site_link(conn, link, jan, "GitHub", "https://github.com/jan2", None)?);
            assert_eq!(site_link_by_id(conn, link)?.unwrap().url, "https://github.com/jan2");
            assert!(delete_site_link(conn, link, jan)?);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn groups_and_activation() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let id = insert_account(
                conn,
                &NewAccount {
                    username: "anna",
                    email: "anna@example.com",
                    password_hash: "hash",
                    first_name: "Anna",
                    last_name: "",
                    is_active: false,
                },
            )?;
            add_account_to_group(conn, id, "Customer")?;
            add_account_to_group(conn, id, "Customer")?;
            assert_eq!(account_groups(conn, id)?, vec!["Customer".to_string()]);

            assert!(activate_account(conn, id)?);
            assert!(!activate_account(conn, id)?);
            assert!(account_by_id(conn, id)?.unwrap().is_active);
            Ok(())
        })
        .unwrap();
    }
}

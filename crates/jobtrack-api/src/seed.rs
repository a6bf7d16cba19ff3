//! Synthetic users and résumés for demos and load tests. All randomness comes
//! from the caller's `StdRng`, so a seed reproduces the same data set.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use jobtrack_db::Database;
use jobtrack_db::queries::accounts::{self, NewAccount, ProfileFields};
use jobtrack_db::queries::resumes::{NewResume, insert_resume};
use jobtrack_types::format::{capitalize_name, leading_title, resume_file_path};

use crate::auth::{check_available, hash_password, insert_account_with_profile};
use crate::storage::Storage;

const CITIES: &[&str] = &[
    "Warszawa", "Kraków", "Łódź", "Wrocław", "Poznań", "Gdańsk", "Szczecin", "Bydgoszcz",
    "Lublin", "Białystok",
];

const MALE_FIRST: &[&str] = &[
    "Piotr", "Krzysztof", "Tomasz", "Andrzej", "Paweł", "Michał", "Marcin", "Jakub", "Adam",
    "Łukasz", "Mateusz", "Jan",
];
const FEMALE_FIRST: &[&str] = &[
    "Anna", "Katarzyna", "Maria", "Małgorzata", "Agnieszka", "Barbara", "Ewa", "Magdalena",
    "Joanna", "Aleksandra", "Zofia", "Monika",
];
const MALE_LAST: &[&str] = &[
    "Nowak", "Kowalski", "Wiśniewski", "Wójcik", "Kowalczyk", "Kamiński", "Lewandowski",
    "Zieliński", "Szymański", "Woźniak", "Dąbrowski", "Kozłowski",
];
const FEMALE_LAST: &[&str] = &[
    "Nowak", "Kowalska", "Wiśniewska", "Wójcik", "Kowalczyk", "Kamińska", "Lewandowska",
    "Zielińska", "Szymańska", "Woźniak", "Dąbrowska", "Kozłowska",
];

const PASSWORD_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()";
pub const MIN_PASSWORD_LEN: usize = 8;
const DOMAIN: &str = "example.com";

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedUser {
    pub first_name: String,
    pub last_name: String,
    pub country: String,
    pub city: String,
    pub phone_number: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

pub fn generate_password(rng: &mut StdRng, length: usize) -> Result<String> {
    if length < MIN_PASSWORD_LEN {
        bail!("Password length should be at least {} characters.", MIN_PASSWORD_LEN);
    }
    Ok((0..length)
        .map(|_| PASSWORD_ALPHABET[rng.random_range(0..PASSWORD_ALPHABET.len())] as char)
        .collect())
}

/// `+48` followed by nine random digits.
pub fn generate_phone_number(rng: &mut StdRng) -> String {
    let digits: String = (0..9)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect();
    format!("+48{digits}")
}

pub fn generate_username(first_name: &str, last_name: &str) -> String {
    format!("{}.{}", first_name.to_lowercase(), last_name.to_lowercase())
}

pub fn generate_email(first_name: &str, last_name: &str) -> String {
    format!("{}@{}", generate_username(first_name, last_name), DOMAIN)
}

pub fn generate_users(rng: &mut StdRng, n: usize) -> Result<Vec<GeneratedUser>> {
    let mut users = Vec::with_capacity(n);
    for _ in 0..n {
        let (first, last) = if rng.random_bool(0.5) {
            (MALE_FIRST.choose(rng), MALE_LAST.choose(rng))
        } else {
            (FEMALE_FIRST.choose(rng), FEMALE_LAST.choose(rng))
        };
        let (Some(first), Some(last)) = (first, last) else {
            bail!("name lists are empty");
        };
        let city = CITIES.choose(rng).copied().unwrap_or("Warszawa");

        users.push(GeneratedUser {
            first_name: first.to_string(),
            last_name: last.to_string(),
            country: "Poland".to_string(),
            city: city.to_string(),
            phone_number: generate_phone_number(rng),
            username: generate_username(first, last),
            email: generate_email(first, last),
            password: generate_password(rng, 12)?,
        });
    }
    Ok(users)
}

/// Persist generated users as active accounts with profiles. Users whose
/// username or e-mail is already taken are skipped. Returns how many were created.
pub fn load_users(db: &Database, users: &[GeneratedUser]) -> Result<usize> {
    let mut created = 0;
    for user in users {
        let taken = db.with_conn(|conn| check_available(conn, &user.username, &user.email))?;
        if !taken.is_empty() {
            warn!("Skipping {}: {}", user.username, taken);
            continue;
        }

        let password_hash = hash_password(&user.password)?;
        db.with_tx(|tx| {
            insert_account_with_profile(
                tx,
                &NewAccount {
                    username: &user.username,
                    email: &user.email,
                    password_hash: &password_hash,
                    first_name: &user.first_name,
                    last_name: &user.last_name,
                    is_active: true,
                },
                &ProfileFields {
                    phone_number: Some(user.phone_number.clone()),
                    country: Some(user.country.clone()),
                    city: Some(user.city.clone()),
                    profile_picture: None,
                },
            )
        })?;
        created += 1;
    }
    info!("Created {} of {} users", created, users.len());
    Ok(created)
}

// -- Résumés --

const DESCRIPTION_MAX: usize = 128;
const JOB_TITLE_MAX: usize = 64;
/// The character before the first lower-case one is the next word's capital.
const TITLE_FORGET_LAST: usize = 2;

/// One row of a résumé dataset CSV (`Category`, `Resume_str`, `Resume_html`).
#[derive(Debug, Clone, Deserialize)]
pub struct SampleResume {
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Resume_str")]
    pub text: String,
    #[serde(rename = "Resume_html", default)]
    pub html: String,
}

pub fn read_samples<R: Read>(reader: R) -> Result<Vec<SampleResume>> {
    let mut csv_reader = csv::ReaderBuilder::new().from_reader(reader);
    let mut samples = Vec::new();
    for record in csv_reader.deserialize::<SampleResume>() {
        samples.push(record?);
    }
    Ok(samples)
}

pub fn read_samples_from_path(path: &Path) -> Result<Vec<SampleResume>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Cannot open résumé dataset {}", path.display()))?;
    read_samples(file)
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedResume {
    pub description: String,
    pub job_title: String,
    pub category: String,
    #[serde(skip)]
    pub document: String,
    /// `html` when the sample carried markup, `txt` otherwise.
    pub extension: &'static str,
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Draw `n` distinct samples and shape them into résumé rows.
pub fn generate_resumes(
    rng: &mut StdRng,
    samples: &[SampleResume],
    n: usize,
) -> Result<Vec<GeneratedResume>> {
    if n > samples.len() {
        bail!("Cannot draw {} résumés from a dataset of {}", n, samples.len());
    }
    let resumes = samples
        .choose_multiple(rng, n)
        .map(|sample| {
            let title = leading_title(&sample.text, TITLE_FORGET_LAST);
            let (document, extension) = if sample.html.trim().is_empty() {
                (sample.text.clone(), "txt")
            } else {
                (sample.html.clone(), "html")
            };
            GeneratedResume {
                description: truncate_chars(sample.text.trim(), DESCRIPTION_MAX),
                job_title: truncate_chars(title.trim(), JOB_TITLE_MAX),
                category: capitalize_name(&sample.category),
                document,
                extension,
            }
        })
        .collect();
    Ok(resumes)
}

/// Assign each résumé to a random existing account, store its document and
/// insert all rows in one transaction. Stored documents are removed again if
/// the insert fails. Returns how many were created.
pub async fn load_resumes(
    db: &Database,
    storage: &Storage,
    rng: &mut StdRng,
    resumes: &[GeneratedResume],
) -> Result<usize> {
    let owners = db.with_conn(accounts::account_usernames)?;
    if owners.is_empty() {
        bail!("No accounts to assign résumés to; seed users first");
    }

    let now = chrono::Utc::now();
    let mut rows = Vec::with_capacity(resumes.len());
    let mut stored_paths = Vec::with_capacity(resumes.len());
    for (i, resume) in resumes.iter().enumerate() {
        let Some((account_id, username)) = owners.choose(rng) else {
            bail!("No accounts to assign résumés to");
        };
        let file_name = format!("{}_resume_{}.{}", username, i, resume.extension);
        let path = resume_file_path(username, &resume.job_title, &file_name, now);
        let stored = match storage.save(&path, resume.document.as_bytes()).await {
            Ok(stored) => stored,
            Err(e) => {
                remove_stored(storage, &stored_paths).await;
                return Err(e);
            }
        };
        debug!("Résumé {} -> {} ({})", i, username, stored);
        stored_paths.push(stored.clone());
        rows.push(NewResume {
            account_id: *account_id,
            description: resume.description.clone(),
            job_title: Some(resume.job_title.clone()),
            file_name: Some(file_name),
            file: Some(stored),
            summary: None,
            category: resume.category.clone(),
        });
    }

    let inserted = db.with_tx(|tx| {
        for row in &rows {
            insert_resume(tx, row)?;
        }
        Ok(rows.len())
    });
    match inserted {
        Ok(created) => {
            info!("Created {} résumés for {} accounts", created, owners.len());
            Ok(created)
        }
        Err(e) => {
            remove_stored(storage, &stored_paths).await;
            Err(e)
        }
    }
}

async fn remove_stored(storage: &Storage, paths: &[String]) {
    for path in paths {
        if let Err(e) = storage.delete_file(path).await {
            warn!("Failed to remove seeded résumé {}: {}", path, e);
        }
    }
}

//! Display and naming helpers shared by the API and the seeding tool.

use chrono::{DateTime, Utc};

struct PhoneFormat {
    length: usize,
    prefix: &'static str,
    us_style: bool,
}

const POLAND: PhoneFormat = PhoneFormat {
    length: 9,
    prefix: "+48",
    us_style: false,
};

const UNITED_STATES: PhoneFormat = PhoneFormat {
    length: 10,
    prefix: "+1",
    us_style: true,
};

fn phone_format_for(country: &str) -> &'static PhoneFormat {
    match country.trim().to_lowercase().as_str() {
        "united states" | "us" => &UNITED_STATES,
        // "poland", "pl" and anything unrecognised
        _ => &POLAND,
    }
}

/// Group a stored phone number for display.
///
/// Only the trailing national digits are kept (so `+48123456789` and
/// `123456789` format identically). Polish numbers render as
/// `+48 123 456 789`, US numbers as `+1 (123) 456-7890`.
pub fn format_phone(phone_number: &str, country: &str) -> String {
    let details = phone_format_for(country);
    let chars: Vec<char> = phone_number.trim().chars().collect();
    let start = chars.len().saturating_sub(details.length);
    let national = &chars[start..];

    let part = |from: usize, to: usize| -> String {
        national
            .iter()
            .skip(from)
            .take(to.saturating_sub(from))
            .collect()
    };
    let part1 = part(0, 3);
    let part2 = part(3, 6);
    let part3 = part(6, national.len());

    if details.us_style {
        format!("{} ({}) {}-{}", details.prefix, part1, part2, part3)
    } else {
        format!("{} {} {} {}", details.prefix, part1, part2, part3)
    }
}

/// Make a string safe to embed in a file name: spaces become underscores,
/// everything except letters, digits and underscores is dropped and runs of
/// underscores collapse to one.
pub fn sanitize_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let c = if c == ' ' { '_' } else { c };
        if !(c.is_alphanumeric() || c == '_') {
            continue;
        }
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}

fn extension(original_name: &str) -> String {
    let ext = original_name.rsplit('.').next().unwrap_or_default();
    ext.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// `resumes/<username>_<jobtitle>_<YYYYmmddHHMMSS>.<ext>`
pub fn resume_file_path(
    username: &str,
    job_title: &str,
    original_name: &str,
    now: DateTime<Utc>,
) -> String {
    let compact_title: String = job_title.chars().filter(|c| *c != ' ' && *c != '_').collect();
    format!(
        "resumes/{}_{}_{}.{}",
        sanitize_name(username),
        sanitize_name(&compact_title),
        now.format("%Y%m%d%H%M%S"),
        extension(original_name)
    )
}

/// `profile_pics/<username>_<YYYYmmddHHMMSS>.<ext>`
pub fn profile_picture_path(username: &str, original_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "profile_pics/{}_{}.{}",
        sanitize_name(username),
        now.format("%Y%m%d%H%M%S"),
        extension(original_name)
    )
}

/// Upper-case the first character and lower-case the rest (`kOWALski` -> `Kowalski`).
pub fn capitalize_name(name: &str) -> String {
    capitalize_word(name.trim())
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Capitalize every space-separated word. Runs of spaces are kept.
pub fn capitalize_words(s: &str) -> String {
    s.split(' ').map(capitalize_word).collect::<Vec<_>>().join(" ")
}

/// Title taken from the upper-case run that opens a plain-text résumé
/// (`"SENIOR DEVELOPER Experienced..."` -> `"Senior Developer"`).
///
/// Everything before the first lower-case character is kept, minus
/// `forget_last` characters that belong to the next word's capital. Text with
/// no lower-case characters is returned with spaces and underscores trimmed.
pub fn leading_title(text: &str, forget_last: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    match chars.iter().position(|c| c.is_lowercase()) {
        Some(i) => {
            let head: String = chars[..i.saturating_sub(forget_last)].iter().collect();
            capitalize_words(&head)
        }
        None => text.trim_matches([' ', '_']).to_string(),
    }
}

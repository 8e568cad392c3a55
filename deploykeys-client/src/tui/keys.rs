use chrono::{DateTime, Utc};

use deploykeys_shared::{repository::RepositoryRef, ssh::DeployKey};

use crate::util::format::{
    BOLD, CYAN, DIM, GREEN, YELLOW, format_relative_time, pad_cell, paint, truncate_str,
};

const WIDTH_ID: usize = 10;
const WIDTH_TITLE: usize = 24;
const WIDTH_ACCESS: usize = 6;
const WIDTH_FINGERPRINT: usize = 52;
const WIDTH_CREATED: usize = 14;

fn access_badge(read_only: bool) -> String {
    if read_only {
        paint(GREEN, "ro")
    } else {
        paint(YELLOW, "rw")
    }
}

fn last_used(key: &DeployKey, now: DateTime<Utc>) -> String {
    match key.last_used {
        Some(at) => format_relative_time(at, now),
        None => paint(DIM, "never"),
    }
}

fn row(cells: &[(String, usize)], tail: &str) -> String {
    let mut out: Vec<String> = cells.iter().map(|(c, w)| pad_cell(c, *w)).collect();
    out.push(tail.to_string());
    out.join(" ")
}

/// One table row per key, header included.
pub fn render_keys_table(repo: &RepositoryRef, keys: &[DeployKey], now: DateTime<Utc>) -> Vec<String> {
    let mut lines = vec![format!("{} {}", paint(BOLD, "Deploy keys"), paint(CYAN, &repo.to_string()))];

    if keys.is_empty() {
        lines.push(format!("  {}", paint(DIM, "No deploy keys found")));
        return lines;
    }

    lines.push(format!(
        "  {}",
        row(
            &[
                (paint(DIM, "ID"), WIDTH_ID),
                (paint(DIM, "TITLE"), WIDTH_TITLE),
                (paint(DIM, "ACCESS"), WIDTH_ACCESS),
                (paint(DIM, "FINGERPRINT"), WIDTH_FINGERPRINT),
                (paint(DIM, "CREATED"), WIDTH_CREATED),
            ],
            &paint(DIM, "LAST USED"),
        )
    ));

    for key in keys {
        let title = truncate_str(&key.title, WIDTH_TITLE - 1);
        let fingerprint = key.fingerprint().unwrap_or_else(|| paint(DIM, "-"));
        let created = format_relative_time(key.created_at, now);

        lines.push(format!(
            "  {}",
            row(
                &[
                    (key.id.to_string(), WIDTH_ID),
                    (title, WIDTH_TITLE),
                    (access_badge(key.read_only), WIDTH_ACCESS),
                    (fingerprint, WIDTH_FINGERPRINT),
                    (created, WIDTH_CREATED),
                ],
                &last_used(key, now),
            )
        ));
    }
    lines
}

pub fn render_key(key: &DeployKey, now: DateTime<Utc>) -> Vec<String> {
    let field = |name: &str, value: String| format!("  {} {}", pad_cell(&paint(DIM, name), 12), value);

    let mut lines = vec![format!("{} {}", paint(BOLD, "Deploy key"), paint(CYAN, &key.id.to_string()))];
    lines.push(field("title", key.title.clone()));
    lines.push(field("access", access_badge(key.read_only)));
    lines.push(field("verified", key.verified.to_string()));
    if let Some(fingerprint) = key.fingerprint() {
        lines.push(field("fingerprint", fingerprint));
    }
    lines.push(field("created", key.created_at.to_rfc3339()));
    lines.push(field("last used", last_used(key, now)));
    if let Some(added_by) = &key.added_by {
        lines.push(field("added by", added_by.clone()));
    }
    lines.push(field("key", key.key.clone()));
    lines
}

pub fn print_keys_table(repo: &RepositoryRef, keys: &[DeployKey]) {
    for line in render_keys_table(repo, keys, Utc::now()) {
        println!("{line}");
    }
}

pub fn print_key(key: &DeployKey) {
    for line in render_key(key, Utc::now()) {
        println!("{line}");
    }
}

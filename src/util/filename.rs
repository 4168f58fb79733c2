//! Rendering of backup file names from a template.
//!
//! A template may contain the tokens `{db}` and `{date}`. Unknown tokens
//! are kept verbatim.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::{Captures, Regex};

/// Format of the `{date}` token: `YYYY_MM_DD_HHmmss`.
pub const DATE_FORMAT: &str = "%Y_%m_%d_%H%M%S";

/// Template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "backup_{db}_{date}.sql";

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(db|date)\}").expect("token pattern should be valid"));

/// Substitutes `{db}` with `db_name` and `{date}` with `timestamp` in `template`.
pub fn render(template: &str, db_name: &str, timestamp: NaiveDateTime) -> String {
    let date = timestamp.format(DATE_FORMAT).to_string();

    TOKEN
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "db" => db_name.to_string(),
            _ => date.clone(),
        })
        .into_owned()
}

/// Returns if `name` can be used as a single path component.
pub fn is_plain_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

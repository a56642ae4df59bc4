use std::sync::atomic::{AtomicI64, Ordering};

use time::macros::format_description;
use time::OffsetDateTime;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const HTML_EXT: &str = ".html";

static LAST_STAMP_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Chooses the file name a page will be stored under.
pub fn make_safe_filename(slug: &str, original_name: &str) -> String {
    let slug = slug.trim();
    if !slug.is_empty() {
        return ensure_html(from_slug(slug).unwrap_or_else(|| format!("page-{}", next_stamp_millis())));
    }
    ensure_html(from_original(original_name).unwrap_or_else(timestamp_stem))
}

fn from_slug(slug: &str) -> Option<String> {
    let replaced: String = slug
        .nfkd()
        .map(|c| if is_allowed(c) { c } else { '-' })
        .collect();
    non_empty(collapse_dashes(&replaced).trim_matches(|c| matches!(c, '-' | '_' | '.')))
}

fn from_original(original_name: &str) -> Option<String> {
    let base = strip_html_suffix(original_name.trim());
    let ascii: String = base
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    non_empty(collapse_dashes(&ascii).trim_matches('-')).map(|s| s.to_ascii_lowercase())
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

fn collapse_dashes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn has_html_suffix(name: &str) -> bool {
    name.len() >= HTML_EXT.len()
        && name.is_char_boundary(name.len() - HTML_EXT.len())
        && name[name.len() - HTML_EXT.len()..].eq_ignore_ascii_case(HTML_EXT)
}

/// Drops a trailing `.html` in any letter case.
pub fn strip_html_suffix(name: &str) -> &str {
    if has_html_suffix(name) { &name[..name.len() - HTML_EXT.len()] } else { name }
}

fn ensure_html(stem: String) -> String {
    if has_html_suffix(&stem) { stem } else { stem + HTML_EXT }
}

fn timestamp_stem() -> String {
    let millis = next_stamp_millis();
    let at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    let fmt = format_description!("[year][month][day][hour][minute][second][subsecond digits:3]");
    match at.format(&fmt) {
        Ok(stamp) => format!("page-{stamp}"),
        Err(_) => format!("page-{millis}"),
    }
}

/// Unix millis, strictly increasing within the process.
fn next_stamp_millis() -> i64 {
    let now = i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000)
        .unwrap_or(i64::MAX);
    let mut last = LAST_STAMP_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_STAMP_MILLIS.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(seen) => last = seen,
        }
    }
}

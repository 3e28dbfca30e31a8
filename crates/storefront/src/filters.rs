//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Returns the content hash of a bundled asset, for cache busting.
///
/// The hashes are computed at build time from the file contents.
///
/// Usage in templates: `/static/css/main.css?v={{ "css"|asset_version }}`
#[askama::filter_fn]
pub fn asset_version(kind: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(match kind.to_string().as_str() {
        "css" => env!("CSS_HASH"),
        "js" => env!("JS_HASH"),
        _ => "",
    })
}

/// Renders a 1-5 star count as filled and empty stars.
///
/// Usage in templates: `{{ rating.stars|stars }}`
#[askama::filter_fn]
pub fn stars(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(star_string(&value.to_string()))
}

fn star_string(value: &str) -> String {
    let filled = value.parse::<usize>().unwrap_or(0).min(5);
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

//! Per-item detail page scraper. Label-anchored regexes over the item page
//! HTML; robust to markup shuffles as long as the labels survive.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::config::SCRAPE_TIMEOUT_SECS;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ItemSnapshot {
    pub median_gold: f64,
    pub min_gold: f64,
    pub qty: i64,
}

fn median_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)Median\s*Buyout[^0-9]*([0-9]+(?:\.[0-9]+)?)").expect("valid pattern")
    })
}

fn min_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)Min\s*Buyout[^0-9]*([0-9]+(?:\.[0-9]+)?)").expect("valid pattern")
    })
}

fn qty_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)Quantity[^0-9]*([0-9]+)").expect("valid pattern"))
}

/// Fetch one item page and extract its three price fields.
pub async fn fetch_item_snapshot(url: &str) -> Result<ItemSnapshot> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(SCRAPE_TIMEOUT_SECS))
        .user_agent("Mozilla/5.0 (ah-scanner; +local)")
        .build()?;

    let html = client.get(url).send().await?.error_for_status()?.text().await?;
    parse_item_page(&html)
}

/// Extraction failures name the missing field so a layout change on the
/// remote side is diagnosable from the error alone.
pub fn parse_item_page(html: &str) -> Result<ItemSnapshot> {
    let median_gold = extract_f64(html, median_regex(), "median buyout")?;
    let min_gold = extract_f64(html, min_regex(), "min buyout")?;
    let qty = extract_i64(html, qty_regex(), "quantity")?;
    Ok(ItemSnapshot { median_gold, min_gold, qty })
}

fn extract_f64(html: &str, re: &Regex, field: &'static str) -> Result<f64> {
    re.captures(html)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or(AppError::Scrape { field })
}

fn extract_i64(html: &str, re: &Regex, field: &'static str) -> Result<i64> {
    re.captures(html)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .ok_or(AppError::Scrape { field })
}

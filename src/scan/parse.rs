//! Listing parser: one raw entry token in, one `ListingRecord` out.
//!
//! The tuple layout is positional and addon-defined. Counting from the
//! trailing `false` sentinel backwards: `..., minBid, bidIncrement, buyout,
//! currentBid, false`. The stack size sits at fixed index 6 from the front.
//! If the addon ever reorders fields these offsets go quietly wrong rather
//! than loudly — best-effort is the historical behavior and is kept.

use thiserror::Error;

use crate::config::COPPER_PER_GOLD;
use crate::scan::extract::ITEM_LINK_MARKER;

/// Terminates every tuple (the auction's is-bid flag).
const SENTINEL: &str = "false";

/// 0-based comma-split index of the stack size field.
const STACK_INDEX: usize = 6;

/// Buyout sits this many fields before the sentinel.
const BUYOUT_BACK: usize = 2;

/// Minimum bid sits this many fields before the sentinel.
const MIN_BID_BACK: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    pub item_id: i64,
    /// Effective price in copper, always > 0. Buyout when the listing has
    /// one, otherwise the minimum bid.
    pub buyout_copper: i64,
    /// Units in the listing, >= 1.
    pub stack_size: i64,
}

impl ListingRecord {
    /// Per-unit price in gold.
    pub fn unit_gold(&self) -> f64 {
        self.buyout_copper as f64 / self.stack_size as f64 / COPPER_PER_GOLD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("entry has no item link")]
    MissingItemLink,
    #[error("item id is not an integer")]
    BadItemId,
    #[error("entry has no trailing false sentinel")]
    MissingSentinel,
    #[error("entry has no usable buyout or min-bid")]
    NoUsablePrice,
}

/// Parse one entry token. Failures are per-entry: the caller counts them and
/// moves on, they never abort the batch.
pub fn parse_entry(entry: &str) -> Result<ListingRecord, ParseError> {
    let item_id = item_id(entry)?;

    let fields: Vec<&str> = entry.split(',').collect();

    // Scan from the end so trailing garbage after the sentinel is tolerated.
    let sentinel = fields
        .iter()
        .rposition(|f| {
            let t = f.trim();
            t == SENTINEL || t.starts_with(SENTINEL)
        })
        .ok_or(ParseError::MissingSentinel)?;

    let mut stack = 1i64;
    if let Some(st) = fields.get(STACK_INDEX).and_then(|f| f.trim().parse::<i64>().ok()) {
        if st > 0 {
            stack = st;
        }
    }

    let mut buyout = positional_price(&fields, sentinel, BUYOUT_BACK);
    if buyout <= 0 {
        buyout = positional_price(&fields, sentinel, MIN_BID_BACK);
    }
    if buyout <= 0 {
        return Err(ParseError::NoUsablePrice);
    }

    Ok(ListingRecord {
        item_id,
        buyout_copper: buyout,
        stack_size: stack,
    })
}

/// The integer immediately following the item link marker.
fn item_id(entry: &str) -> Result<i64, ParseError> {
    let start = entry
        .find(ITEM_LINK_MARKER)
        .ok_or(ParseError::MissingItemLink)?
        + ITEM_LINK_MARKER.len();
    let digits: &str = {
        let rest = &entry[start..];
        let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        &rest[..end]
    };
    if digits.is_empty() {
        return Err(ParseError::BadItemId);
    }
    digits.parse::<i64>().map_err(|_| ParseError::BadItemId)
}

/// Field `back` positions before the sentinel, parsed as copper. Short field
/// lists and non-numeric fields read as 0, which the caller treats as absent.
fn positional_price(fields: &[&str], sentinel: usize, back: usize) -> i64 {
    if sentinel < back {
        return 0;
    }
    fields[sentinel - back]
        .trim()
        .parse::<i64>()
        .map(|v| v.max(0))
        .unwrap_or(0)
}

pub mod aggregate;
pub mod extract;
pub mod parse;

pub use aggregate::{aggregate, PriceAggregate};
pub use extract::{entries, scan_timestamp, DocumentShape};
pub use parse::{parse_entry, ListingRecord, ParseError};

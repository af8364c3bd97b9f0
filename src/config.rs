use crate::error::{AppError, Result};

pub const SCAN_FILE_URL: &str = "https://ah.nerfed.net/realm/getfile";
pub const ITEM_PAGE_URL: &str = "https://ah.nerfed.net/item/index";

/// Copper per gold — listing prices arrive in copper, the catalog stores gold.
pub const COPPER_PER_GOLD: f64 = 10_000.0;

/// Scan download timeout (seconds). Full scan files run to tens of MB.
pub const FETCH_TIMEOUT_SECS: u64 = 300;

/// Item page scrape timeout (seconds).
pub const SCRAPE_TIMEOUT_SECS: u64 = 30;

/// Default interval between ingestion cycles (seconds).
pub const SCAN_INTERVAL_SECS: u64 = 3600;

/// Default price history retention window (hours).
pub const RETENTION_HOURS: i64 = 72;

#[derive(Debug, Clone)]
pub struct Config {
    /// Realm id of the tracked auction house (REALM_ID).
    pub realm: i64,
    /// Faction id, 1 = Alliance, 2 = Horde (FACTION_ID).
    pub faction: i64,
    /// Full URL of the scan file endpoint (SCAN_URL overrides the default
    /// built from realm + faction).
    pub scan_url: String,
    /// Seconds between ingestion cycles (SCAN_INTERVAL_SECS).
    pub scan_interval_secs: u64,
    /// History samples older than this many hours are purged (RETENTION_HOURS).
    pub retention_hours: i64,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let realm = std::env::var("REALM_ID")
            .unwrap_or_else(|_| "17".to_string())
            .parse::<i64>()
            .map_err(|_| AppError::Config("REALM_ID must be an integer".to_string()))?;
        let faction = std::env::var("FACTION_ID")
            .unwrap_or_else(|_| "1".to_string())
            .parse::<i64>()
            .map_err(|_| AppError::Config("FACTION_ID must be an integer".to_string()))?;

        Ok(Self {
            realm,
            faction,
            scan_url: std::env::var("SCAN_URL").unwrap_or_else(|_| {
                format!("{SCAN_FILE_URL}?id={realm}&faction={faction}")
            }),
            scan_interval_secs: std::env::var("SCAN_INTERVAL_SECS")
                .unwrap_or_else(|_| SCAN_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(SCAN_INTERVAL_SECS),
            retention_hours: std::env::var("RETENTION_HOURS")
                .unwrap_or_else(|_| RETENTION_HOURS.to_string())
                .parse::<i64>()
                .unwrap_or(RETENTION_HOURS),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "tracker.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
        })
    }
}

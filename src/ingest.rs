//! Ingestion pipeline: fetch → extract → parse → aggregate → persist.
//!
//! `ingest_document` is the whole cycle for one document and is shared by the
//! hourly scheduler and the upload endpoint. All writes for a cycle happen in
//! one transaction; a failure anywhere commits nothing.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::config::{Config, FETCH_TIMEOUT_SECS};
use crate::db::store;
use crate::error::Result;
use crate::scan::extract::ITEM_LINK_MARKER;
use crate::scan::{aggregate, entries, parse_entry, scan_timestamp, DocumentShape};

/// Counts reported back for every processed document.
#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestSummary {
    pub lines_with_links: usize,
    pub entries_seen: usize,
    pub rows_parsed: usize,
    pub rows_failed: usize,
    pub items_created: usize,
    pub items_updated: usize,
    pub history_inserted: usize,
    pub history_trimmed: u64,
    /// Effective sample timestamp: the document's embedded scan time when
    /// present, otherwise the ingestion wall clock.
    pub timestamp_utc: i64,
}

/// Run one full ingestion cycle over an in-memory scan document.
pub async fn ingest_document(
    pool: &sqlx::SqlitePool,
    cfg: &Config,
    text: &str,
    shape: DocumentShape,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    summary.lines_with_links = match shape {
        DocumentShape::Lines => text.lines().filter(|l| l.contains(ITEM_LINK_MARKER)).count(),
        DocumentShape::Bulk => usize::from(text.contains(ITEM_LINK_MARKER)),
    };

    let scan_ts = scan_timestamp(text);

    let mut records = Vec::new();
    for token in entries(text, shape) {
        summary.entries_seen += 1;
        match parse_entry(&token) {
            Ok(rec) => {
                records.push(rec);
                summary.rows_parsed += 1;
            }
            Err(e) => {
                summary.rows_failed += 1;
                debug!("skipping entry: {e}");
            }
        }
    }

    let aggregates = aggregate(records);

    let now = now_secs();
    let ts = scan_ts.unwrap_or(now);
    summary.timestamp_utc = ts;

    let mut tx = pool.begin().await?;

    let cutoff = now - cfg.retention_hours * 3600;
    summary.history_trimmed = store::delete_history_before(&mut tx, cutoff).await?;
    store::delete_history_at(&mut tx, ts).await?;

    for agg in &aggregates {
        let url = store::canonical_item_url(agg.item_id, cfg.faction, cfg.realm);

        let existing = match store::find_by_wow_item_id(&mut tx, agg.item_id).await? {
            Some(item) => Some(item),
            None => store::find_by_url(&mut tx, &url).await?,
        };

        let item_db_id = match existing {
            Some(item) => {
                summary.items_updated += 1;
                item.id
            }
            None => {
                summary.items_created += 1;
                store::insert_item(
                    &mut tx,
                    agg.item_id,
                    &format!("Item {}", agg.item_id),
                    &url,
                    cfg.faction,
                    cfg.realm,
                )
                .await?
            }
        };

        store::update_last_prices(
            &mut tx,
            item_db_id,
            Some(agg.item_id),
            agg.median_gold,
            agg.min_gold,
            agg.total_qty,
            ts,
        )
        .await?;
        store::insert_history(&mut tx, item_db_id, ts, agg.median_gold, agg.min_gold, agg.total_qty)
            .await?;
        summary.history_inserted += 1;
    }

    tx.commit().await?;

    Ok(summary)
}

/// Hourly ingestion loop. One cycle runs to completion (including its own
/// error handling) before the next wait begins, so cycles never overlap. A
/// failed cycle is logged and abandoned; the next tick retries from scratch.
pub struct ScanScheduler {
    cfg: Config,
    pool: sqlx::SqlitePool,
    shutdown: watch::Receiver<bool>,
}

impl ScanScheduler {
    pub fn new(cfg: Config, pool: sqlx::SqlitePool, shutdown: watch::Receiver<bool>) -> Self {
        Self { cfg, pool, shutdown }
    }

    pub async fn run(mut self) {
        let interval = Duration::from_secs(self.cfg.scan_interval_secs);

        loop {
            if *self.shutdown.borrow() {
                info!("scan scheduler stopped");
                return;
            }

            if let Err(e) = self.run_once().await {
                error!("auction scan cycle failed: {e}");
            }

            // Interval measured from cycle completion, shutdown cuts it short.
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.shutdown.changed() => {
                    info!("scan scheduler stopped");
                    return;
                }
            }
        }
    }

    async fn run_once(&self) -> Result<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;

        info!("downloading scan: {}", self.cfg.scan_url);
        let text = client
            .get(&self.cfg.scan_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let summary = ingest_document(&self.pool, &self.cfg, &text, DocumentShape::Bulk).await?;
        info!(
            ts = summary.timestamp_utc,
            entries = summary.entries_seen,
            parsed = summary.rows_parsed,
            failed = summary.rows_failed,
            items_created = summary.items_created,
            items_updated = summary.items_updated,
            history_inserted = summary.history_inserted,
            history_trimmed = summary.history_trimmed,
            "scan cycle complete",
        );
        Ok(())
    }
}

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ItemRow, PriceHistoryRow};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> sqlx::SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
        pool
    }

    fn test_cfg() -> Config {
        Config {
            realm: 17,
            faction: 1,
            scan_url: String::new(),
            scan_interval_secs: 3600,
            retention_hours: 72,
            log_level: "info".to_string(),
            db_path: String::new(),
            api_port: 0,
        }
    }

    fn escaped(entry: &str) -> String {
        entry.replace('"', "\\\"").replace('{', "\\{").replace('}', "\\}")
    }

    fn entry(item_id: i64, stack: i64, min_bid: i64, buyout: i64) -> String {
        format!(
            r#"{{"|cffffffff|Hitem:{item_id}:0:0:0|h[Test Item]|h|r",{item_id},"Armor","Cloth",8,1,{stack},1700000000,{min_bid},10,{buyout},0,false"#
        )
    }

    fn bulk_doc(ts: i64, entries: &[String]) -> String {
        let body: Vec<String> = entries.iter().map(|e| escaped(e)).collect();
        format!("LastFullScan = {ts}\nAhScanData = \"{}\"", body.join(","))
    }

    async fn items(pool: &sqlx::SqlitePool) -> Vec<ItemRow> {
        sqlx::query_as::<_, ItemRow>("SELECT * FROM items ORDER BY id")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    async fn history(pool: &sqlx::SqlitePool) -> Vec<PriceHistoryRow> {
        sqlx::query_as::<_, PriceHistoryRow>(
            "SELECT * FROM price_history ORDER BY timestamp_utc, id",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn end_to_end_two_entry_bulk_document() {
        let pool = test_pool().await;
        let cfg = test_cfg();
        let doc = bulk_doc(1700000000, &[entry(100, 1, 0, 20000), entry(100, 2, 0, 10000)]);

        let summary = ingest_document(&pool, &cfg, &doc, DocumentShape::Bulk).await.unwrap();
        assert_eq!(summary.entries_seen, 2);
        assert_eq!(summary.rows_parsed, 2);
        assert_eq!(summary.rows_failed, 0);
        assert_eq!(summary.items_created, 1);
        assert_eq!(summary.items_updated, 0);
        assert_eq!(summary.history_inserted, 1);
        assert_eq!(summary.timestamp_utc, 1700000000);

        let items = items(&pool).await;
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.wow_item_id, Some(100));
        assert_eq!(item.url, store::canonical_item_url(100, 1, 17));
        // Unit prices 2.0g and 0.5g → sorted [0.5, 2.0].
        assert_eq!(item.last_median_gold, Some(1.25));
        assert_eq!(item.last_min_gold, Some(0.5));
        assert_eq!(item.last_qty, Some(3));
        assert_eq!(item.last_fetched_at, Some(1700000000));

        let hist = history(&pool).await;
        assert_eq!(hist.len(), 1);
        assert_eq!(hist[0].item_id, item.id);
        assert_eq!(hist[0].timestamp_utc, 1700000000);
        assert_eq!(hist[0].median_gold, 1.25);
        assert_eq!(hist[0].min_gold, 0.5);
        assert_eq!(hist[0].qty, 3);
    }

    #[tokio::test]
    async fn reingesting_the_same_document_is_idempotent() {
        let pool = test_pool().await;
        let cfg = test_cfg();
        let doc = bulk_doc(1700000000, &[entry(100, 1, 0, 20000)]);

        ingest_document(&pool, &cfg, &doc, DocumentShape::Bulk).await.unwrap();
        let second = ingest_document(&pool, &cfg, &doc, DocumentShape::Bulk).await.unwrap();
        assert_eq!(second.items_created, 0);
        assert_eq!(second.items_updated, 1);

        assert_eq!(items(&pool).await.len(), 1);
        let hist = history(&pool).await;
        assert_eq!(hist.len(), 1, "same timestamp must not duplicate samples");
        assert_eq!(hist[0].timestamp_utc, 1700000000);
    }

    #[tokio::test]
    async fn retention_trim_removes_only_expired_samples() {
        let pool = test_pool().await;
        let cfg = test_cfg();
        let now = now_secs();

        // Seed one catalog entry with samples at now-73h, now-71h, and now.
        {
            let mut conn = pool.acquire().await.unwrap();
            let id = store::insert_item(&mut conn, 100, "Item 100",
                &store::canonical_item_url(100, 1, 17), 1, 17).await.unwrap();
            for age_hours in [73i64, 71, 0] {
                store::insert_history(&mut conn, id, now - age_hours * 3600, 1.0, 1.0, 1)
                    .await
                    .unwrap();
            }
        }

        let doc = bulk_doc(now + 1, &[entry(100, 1, 0, 20000)]);
        let summary = ingest_document(&pool, &cfg, &doc, DocumentShape::Bulk).await.unwrap();
        assert_eq!(summary.history_trimmed, 1);

        let stamps: Vec<i64> = history(&pool).await.iter().map(|h| h.timestamp_utc).collect();
        assert_eq!(stamps, vec![now - 71 * 3600, now, now + 1]);
    }

    #[tokio::test]
    async fn url_match_backfills_external_item_id() {
        let pool = test_pool().await;
        let cfg = test_cfg();
        let url = store::canonical_item_url(100, 1, 17);

        // Entry from an earlier manual import: known URL, no external id.
        sqlx::query("INSERT INTO items (wow_item_id, name, url, faction, realm) VALUES (NULL, ?, ?, 1, 17)")
            .bind("Copper Bar")
            .bind(&url)
            .execute(&pool)
            .await
            .unwrap();

        let doc = bulk_doc(1700000000, &[entry(100, 1, 0, 20000)]);
        let summary = ingest_document(&pool, &cfg, &doc, DocumentShape::Bulk).await.unwrap();
        assert_eq!(summary.items_created, 0);
        assert_eq!(summary.items_updated, 1);

        let items = items(&pool).await;
        assert_eq!(items.len(), 1, "URL match must update, not duplicate");
        assert_eq!(items[0].wow_item_id, Some(100));
        assert_eq!(items[0].name, "Copper Bar", "manual name survives");
        assert_eq!(items[0].last_median_gold, Some(2.0));
    }

    #[tokio::test]
    async fn bad_entries_are_counted_not_fatal() {
        let pool = test_pool().await;
        let cfg = test_cfg();
        let doc = bulk_doc(
            1700000000,
            &[entry(100, 1, 0, 20000), entry(200, 1, 0, 0)],
        );

        let summary = ingest_document(&pool, &cfg, &doc, DocumentShape::Bulk).await.unwrap();
        assert_eq!(summary.entries_seen, 2);
        assert_eq!(summary.rows_parsed, 1);
        assert_eq!(summary.rows_failed, 1);
        assert_eq!(summary.history_inserted, 1);
    }

    #[tokio::test]
    async fn empty_document_still_runs_the_trim() {
        let pool = test_pool().await;
        let cfg = test_cfg();

        let summary = ingest_document(&pool, &cfg, "nothing to see", DocumentShape::Bulk)
            .await
            .unwrap();
        assert_eq!(summary.entries_seen, 0);
        assert_eq!(summary.history_inserted, 0);
        assert!(items(&pool).await.is_empty());
    }
}

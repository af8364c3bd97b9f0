//! Catalog and history queries. Cycle writes run against one transaction's
//! connection so a failed cycle commits nothing.

use sqlx::SqliteConnection;

use crate::config::ITEM_PAGE_URL;
use crate::db::models::{ItemRow, PriceHistoryRow};
use crate::error::Result;

/// Deterministic per-item identifier, also the catalog's fallback key when
/// no external item id is recorded.
pub fn canonical_item_url(item_id: i64, faction: i64, realm: i64) -> String {
    format!("{ITEM_PAGE_URL}?id={item_id}&faction={faction}&realm={realm}")
}

pub async fn find_by_wow_item_id(
    conn: &mut SqliteConnection,
    wow_item_id: i64,
) -> Result<Option<ItemRow>> {
    let row = sqlx::query_as::<_, ItemRow>("SELECT * FROM items WHERE wow_item_id = ?")
        .bind(wow_item_id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn find_by_url(conn: &mut SqliteConnection, url: &str) -> Result<Option<ItemRow>> {
    let row = sqlx::query_as::<_, ItemRow>("SELECT * FROM items WHERE url = ?")
        .bind(url)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn get_item(conn: &mut SqliteConnection, id: i64) -> Result<Option<ItemRow>> {
    let row = sqlx::query_as::<_, ItemRow>("SELECT * FROM items WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn list_items(conn: &mut SqliteConnection) -> Result<Vec<ItemRow>> {
    let rows = sqlx::query_as::<_, ItemRow>("SELECT * FROM items ORDER BY name, id")
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// Insert a freshly sighted catalog entry; returns its surrogate id.
pub async fn insert_item(
    conn: &mut SqliteConnection,
    wow_item_id: i64,
    name: &str,
    url: &str,
    faction: i64,
    realm: i64,
) -> Result<i64> {
    let res = sqlx::query(
        "INSERT INTO items (wow_item_id, name, url, faction, realm) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(wow_item_id)
    .bind(name)
    .bind(url)
    .bind(faction)
    .bind(realm)
    .execute(conn)
    .await?;
    Ok(res.last_insert_rowid())
}

/// Update an entry's last-known prices. Backfills a missing external item id
/// (URL-matched entries created by older import paths) without overwriting
/// one already recorded.
pub async fn update_last_prices(
    conn: &mut SqliteConnection,
    id: i64,
    wow_item_id: Option<i64>,
    median_gold: f64,
    min_gold: f64,
    qty: i64,
    fetched_at: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE items SET
            wow_item_id = COALESCE(wow_item_id, ?),
            last_median_gold = ?,
            last_min_gold = ?,
            last_qty = ?,
            last_fetched_at = ?
        WHERE id = ?
        "#,
    )
    .bind(wow_item_id)
    .bind(median_gold)
    .bind(min_gold)
    .bind(qty)
    .bind(fetched_at)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_history(
    conn: &mut SqliteConnection,
    item_id: i64,
    timestamp_utc: i64,
    median_gold: f64,
    min_gold: f64,
    qty: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO price_history (item_id, timestamp_utc, median_gold, min_gold, qty)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(item_id)
    .bind(timestamp_utc)
    .bind(median_gold)
    .bind(min_gold)
    .bind(qty)
    .execute(conn)
    .await?;
    Ok(())
}

/// Retention trim: drop every sample older than the cutoff.
pub async fn delete_history_before(conn: &mut SqliteConnection, cutoff: i64) -> Result<u64> {
    let res = sqlx::query("DELETE FROM price_history WHERE timestamp_utc < ?")
        .bind(cutoff)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

/// Idempotent re-run guard: reprocessing a scan with the same embedded
/// timestamp replaces that cycle's samples instead of duplicating them.
pub async fn delete_history_at(conn: &mut SqliteConnection, timestamp_utc: i64) -> Result<u64> {
    let res = sqlx::query("DELETE FROM price_history WHERE timestamp_utc = ?")
        .bind(timestamp_utc)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

pub async fn history_for_item(
    conn: &mut SqliteConnection,
    item_id: i64,
    limit: i64,
) -> Result<Vec<PriceHistoryRow>> {
    let rows = sqlx::query_as::<_, PriceHistoryRow>(
        r#"
        SELECT * FROM price_history
        WHERE item_id = ?
        ORDER BY timestamp_utc DESC
        LIMIT ?
        "#,
    )
    .bind(item_id)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Database row types for the item catalog and price history tables.
/// Used by sqlx for typed queries.

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    pub id: i64,
    /// External (in-game) item id. Nullable: entries created by manual import
    /// paths may predate id tracking and only carry a canonical URL.
    pub wow_item_id: Option<i64>,
    pub name: String,
    pub url: String,
    pub faction: i64,
    pub realm: i64,
    pub last_median_gold: Option<f64>,
    pub last_min_gold: Option<f64>,
    pub last_qty: Option<i64>,
    pub last_fetched_at: Option<i64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceHistoryRow {
    pub id: i64,
    pub item_id: i64,
    pub timestamp_utc: i64,
    pub median_gold: f64,
    pub min_gold: f64,
    pub qty: i64,
}

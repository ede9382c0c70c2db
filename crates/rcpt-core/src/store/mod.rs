//! SQLite persistence for validated receipts.

mod schema;
mod stats;

pub use stats::{CategoryStats, DatabaseStatistics, MonthlyStats, VendorStats};

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, DatabaseName, Row, ToSql, params};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::analytics::{SearchFilters, search};
use crate::error::StoreError;
use crate::models::receipt::{Category, Currency, NewReceipt, Receipt};

const COLUMNS: &str = "id, vendor, transaction_date, amount_cents, items, category, \
     payment_method, currency, source_file, extracted_text, confidence, created_at, updated_at";

const ORDER: &str = "ORDER BY transaction_date DESC, created_at DESC, id DESC";

/// Receipt store over a single SQLite connection.
///
/// Access is serialized through a mutex; callers on an async runtime
/// should use it from blocking tasks.
pub struct ReceiptStore {
    conn: Mutex<Connection>,
}

impl ReceiptStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        info!("Opened receipt database at {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        schema::create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Persist a validated receipt and return it with its new id.
    pub fn insert(&self, receipt: NewReceipt) -> Result<Receipt, StoreError> {
        let now = Utc::now();
        let cents = to_cents(receipt.amount)?;
        let items = serde_json::to_string(&receipt.items)?;

        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO receipts ({}) VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                COLUMNS
            ),
            params![
                receipt.vendor,
                receipt.transaction_date.format("%Y-%m-%d").to_string(),
                cents,
                items,
                receipt.category.as_str(),
                receipt.payment_method,
                receipt.currency.code(),
                receipt.source_file,
                receipt.extracted_text,
                f64::from(receipt.confidence),
                now.to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();

        info!("Saved receipt {} ({}, {})", id, receipt.vendor, receipt.amount);
        Ok(Receipt::from_new(id, receipt, now))
    }

    pub fn get(&self, id: i64) -> Result<Receipt, StoreError> {
        let conn = self.lock()?;
        get_locked(&conn, id)
    }

    /// All receipts, newest transaction first.
    pub fn list(&self) -> Result<Vec<Receipt>, StoreError> {
        let conn = self.lock()?;
        query_receipts(&conn, &format!("SELECT {COLUMNS} FROM receipts {ORDER}"), &[])
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM receipts", [], |row| row.get(0))?)
    }

    /// Overwrite a stored receipt in place, keeping its creation time.
    pub fn update(&self, id: i64, receipt: NewReceipt) -> Result<Receipt, StoreError> {
        let cents = to_cents(receipt.amount)?;
        let items = serde_json::to_string(&receipt.items)?;

        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE receipts SET vendor = ?1, transaction_date = ?2, amount_cents = ?3, items = ?4,
                 category = ?5, payment_method = ?6, currency = ?7, source_file = ?8,
                 extracted_text = ?9, confidence = ?10, updated_at = ?11
             WHERE id = ?12",
            params![
                receipt.vendor,
                receipt.transaction_date.format("%Y-%m-%d").to_string(),
                cents,
                items,
                receipt.category.as_str(),
                receipt.payment_method,
                receipt.currency.code(),
                receipt.source_file,
                receipt.extracted_text,
                f64::from(receipt.confidence),
                Utc::now().to_rfc3339(),
                id,
            ],
        )?;

        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }

        info!("Updated receipt {}", id);
        get_locked(&conn, id)
    }

    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM receipts WHERE id = ?1", params![id])?;

        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }

        info!("Deleted receipt {}", id);
        Ok(())
    }

    /// Delete several receipts in one transaction; unknown ids are skipped.
    pub fn bulk_delete(&self, ids: &[i64]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM receipts WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;

        info!("Deleted {} of {} receipts", deleted, ids.len());
        Ok(deleted)
    }

    /// Receipts matching `filters`, newest transaction first.
    ///
    /// Exact criteria run in SQL; fuzzy vendor matching is applied afterwards.
    pub fn search(&self, filters: &SearchFilters) -> Result<Vec<Receipt>, StoreError> {
        let mut sql = format!("SELECT {COLUMNS} FROM receipts WHERE 1=1");
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        let vendor = filters
            .vendor
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let (Some(vendor), false) = (vendor, filters.fuzzy) {
            sql.push_str(" AND instr(lower(vendor), lower(?)) > 0");
            params.push(Box::new(vendor.to_string()));
        }
        if let Some(from) = filters.date_from {
            sql.push_str(" AND transaction_date >= ?");
            params.push(Box::new(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = filters.date_to {
            sql.push_str(" AND transaction_date <= ?");
            params.push(Box::new(to.format("%Y-%m-%d").to_string()));
        }
        if let Some(min) = filters.amount_min {
            sql.push_str(" AND amount_cents >= ?");
            params.push(Box::new(to_cents(min.max(Decimal::ZERO))?));
        }
        if let Some(max) = filters.amount_max {
            sql.push_str(" AND amount_cents <= ?");
            params.push(Box::new(to_cents(max.max(Decimal::ZERO))?));
        }
        if let Some(category) = filters.category {
            sql.push_str(" AND category = ?");
            params.push(Box::new(category.as_str()));
        }
        if let Some(currency) = filters.currency {
            sql.push_str(" AND currency = ?");
            params.push(Box::new(currency.code()));
        }
        if let Some(min_confidence) = filters.min_confidence {
            sql.push_str(" AND confidence >= ?");
            params.push(Box::new(f64::from(min_confidence)));
        }

        sql.push(' ');
        sql.push_str(ORDER);

        let fuzzy_vendor = vendor.filter(|_| filters.fuzzy);
        if let (Some(limit), None) = (filters.limit, fuzzy_vendor) {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        debug!("Search query: {}", sql);
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let conn = self.lock()?;
        let mut receipts = query_receipts(&conn, &sql, &param_refs)?;

        if fuzzy_vendor.is_some() {
            receipts = search(&receipts, filters).into_iter().cloned().collect();
        }

        Ok(receipts)
    }

    /// Copy the whole database to `path` using SQLite's online backup.
    pub fn backup(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.backup(DatabaseName::Main, path.as_ref(), None)?;
        info!("Backed up receipt database to {}", path.as_ref().display());
        Ok(())
    }

    /// Reclaim space and refresh query planner statistics.
    pub fn optimize(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch("VACUUM; ANALYZE;")?;
        debug!("Database optimized");
        Ok(())
    }
}

fn get_locked(conn: &Connection, id: i64) -> Result<Receipt, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM receipts WHERE id = ?1"),
            params![id],
            ReceiptRow::from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(id),
            other => StoreError::Sqlite(other),
        })?;
    row.into_receipt()
}

fn query_receipts(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<Receipt>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, ReceiptRow::from_row)?;

    let mut receipts = Vec::new();
    for row in rows {
        receipts.push(row?.into_receipt()?);
    }
    Ok(receipts)
}

/// Amount in integer cents; the amount must already have at most two decimals.
pub(crate) fn to_cents(amount: Decimal) -> Result<i64, StoreError> {
    let mut scaled = amount.round_dp(2);
    scaled.rescale(2);
    i64::try_from(scaled.mantissa()).map_err(|_| StoreError::Corrupt {
        column: "amount_cents",
        value: amount.to_string(),
    })
}

pub(crate) fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Raw column values before decoding.
struct ReceiptRow {
    id: i64,
    vendor: String,
    transaction_date: String,
    amount_cents: i64,
    items: String,
    category: String,
    payment_method: String,
    currency: String,
    source_file: String,
    extracted_text: String,
    confidence: f64,
    created_at: String,
    updated_at: String,
}

impl ReceiptRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            vendor: row.get(1)?,
            transaction_date: row.get(2)?,
            amount_cents: row.get(3)?,
            items: row.get(4)?,
            category: row.get(5)?,
            payment_method: row.get(6)?,
            currency: row.get(7)?,
            source_file: row.get(8)?,
            extracted_text: row.get(9)?,
            confidence: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_receipt(self) -> Result<Receipt, StoreError> {
        let corrupt = |column: &'static str, value: &str| StoreError::Corrupt {
            column,
            value: value.to_string(),
        };

        let transaction_date = NaiveDate::parse_from_str(&self.transaction_date, "%Y-%m-%d")
            .map_err(|_| corrupt("transaction_date", &self.transaction_date))?;
        let category: Category = self
            .category
            .parse()
            .map_err(|_| corrupt("category", &self.category))?;
        let currency: Currency = self
            .currency
            .parse()
            .map_err(|_| corrupt("currency", &self.currency))?;
        let created_at = parse_timestamp(&self.created_at)
            .ok_or_else(|| corrupt("created_at", &self.created_at))?;
        let updated_at = parse_timestamp(&self.updated_at)
            .ok_or_else(|| corrupt("updated_at", &self.updated_at))?;

        Ok(Receipt {
            id: self.id,
            vendor: self.vendor,
            transaction_date,
            amount: from_cents(self.amount_cents),
            items: serde_json::from_str(&self.items)?,
            category,
            payment_method: self.payment_method,
            currency,
            source_file: self.source_file,
            extracted_text: self.extracted_text,
            confidence: self.confidence as f32,
            created_at,
            updated_at,
        })
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

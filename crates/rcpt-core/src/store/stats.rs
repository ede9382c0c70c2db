//! Aggregate queries over the receipts table.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::StoreError;
use crate::models::receipt::Category;

use super::{ReceiptStore, from_cents};

/// Receipts below this confidence count as needing review.
pub const LOW_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorStats {
    pub vendor: String,
    pub receipt_count: i64,
    pub total_amount: Decimal,
    pub average_amount: Decimal,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: Category,
    pub receipt_count: i64,
    pub total_amount: Decimal,
    pub average_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyStats {
    /// `YYYY-MM`.
    pub month: String,
    pub receipt_count: i64,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseStatistics {
    pub total_receipts: i64,
    pub total_amount: Decimal,
    pub unique_vendors: i64,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
    pub average_confidence: f64,
    pub low_confidence_receipts: i64,
}

fn average(total_cents: i64, count: i64) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    (from_cents(total_cents) / Decimal::from(count)).round_dp(2)
}

fn parse_date(column: &'static str, value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| StoreError::Corrupt {
        column,
        value: value.to_string(),
    })
}

impl ReceiptStore {
    /// Spend per vendor, highest total first.
    pub fn vendor_statistics(&self) -> Result<Vec<VendorStats>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT vendor, COUNT(*), SUM(amount_cents), MIN(transaction_date), MAX(transaction_date)
             FROM receipts GROUP BY vendor ORDER BY SUM(amount_cents) DESC, vendor",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut stats = Vec::new();
        for row in rows {
            let (vendor, count, cents, first, last) = row?;
            stats.push(VendorStats {
                vendor,
                receipt_count: count,
                total_amount: from_cents(cents),
                average_amount: average(cents, count),
                first_date: parse_date("transaction_date", &first)?,
                last_date: parse_date("transaction_date", &last)?,
            });
        }
        Ok(stats)
    }

    /// Spend per category, highest total first.
    pub fn category_statistics(&self) -> Result<Vec<CategoryStats>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*), SUM(amount_cents)
             FROM receipts GROUP BY category ORDER BY SUM(amount_cents) DESC, category",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut stats = Vec::new();
        for row in rows {
            let (category, count, cents) = row?;
            stats.push(CategoryStats {
                category: category.parse().map_err(|_| StoreError::Corrupt {
                    column: "category",
                    value: category.clone(),
                })?,
                receipt_count: count,
                total_amount: from_cents(cents),
                average_amount: average(cents, count),
            });
        }
        Ok(stats)
    }

    /// Spend per calendar month, oldest first.
    pub fn monthly_statistics(&self) -> Result<Vec<MonthlyStats>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT substr(transaction_date, 1, 7) AS month, COUNT(*), SUM(amount_cents)
             FROM receipts GROUP BY month ORDER BY month",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MonthlyStats {
                month: row.get(0)?,
                receipt_count: row.get(1)?,
                total_amount: from_cents(row.get(2)?),
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Overall counts and ranges.
    pub fn database_statistics(&self) -> Result<DatabaseStatistics, StoreError> {
        let conn = self.lock()?;
        let (total, cents, vendors, earliest, latest, avg_confidence, low) = conn.query_row(
            "SELECT COUNT(*), SUM(amount_cents), COUNT(DISTINCT vendor),
                    MIN(transaction_date), MAX(transaction_date), AVG(confidence),
                    SUM(CASE WHEN confidence < ?1 THEN 1 ELSE 0 END)
             FROM receipts",
            [LOW_CONFIDENCE],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                ))
            },
        )?;

        Ok(DatabaseStatistics {
            total_receipts: total,
            total_amount: from_cents(cents.unwrap_or(0)),
            unique_vendors: vendors,
            earliest_date: earliest
                .map(|d| parse_date("transaction_date", &d))
                .transpose()?,
            latest_date: latest
                .map(|d| parse_date("transaction_date", &d))
                .transpose()?,
            average_confidence: avg_confidence.unwrap_or(0.0),
            low_confidence_receipts: low.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::new_receipt;
    use pretty_assertions::assert_eq;

    fn seeded() -> ReceiptStore {
        let store = ReceiptStore::open_in_memory().unwrap();
        store.insert(new_receipt("Cafe", "2024-01-05", 500)).unwrap();
        store.insert(new_receipt("Cafe", "2024-02-07", 700)).unwrap();
        let mut market = new_receipt("Market", "2024-02-10", 3000);
        market.category = Category::Groceries;
        market.confidence = 0.4;
        store.insert(market).unwrap();
        store
    }

    #[test]
    fn test_vendor_statistics() {
        let stats = seeded().vendor_statistics().unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].vendor, "Market");
        assert_eq!(stats[1].receipt_count, 2);
        assert_eq!(stats[1].average_amount, Decimal::new(600, 2));
        assert_eq!(stats[1].first_date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(stats[1].last_date, NaiveDate::from_ymd_opt(2024, 2, 7).unwrap());
    }

    #[test]
    fn test_category_and_monthly_statistics() {
        let store = seeded();
        let categories = store.category_statistics().unwrap();
        assert_eq!(categories[0].category, Category::Groceries);
        assert_eq!(categories[1].total_amount, Decimal::new(1200, 2));

        let months = store.monthly_statistics().unwrap();
        let keys: Vec<&str> = months.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(keys, vec!["2024-01", "2024-02"]);
        assert_eq!(months[1].total_amount, Decimal::new(3700, 2));
    }

    #[test]
    fn test_database_statistics() {
        let stats = seeded().database_statistics().unwrap();
        assert_eq!(stats.total_receipts, 3);
        assert_eq!(stats.total_amount, Decimal::new(4200, 2));
        assert_eq!(stats.unique_vendors, 2);
        assert_eq!(stats.earliest_date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(stats.low_confidence_receipts, 1);

        let empty = ReceiptStore::open_in_memory().unwrap().database_statistics().unwrap();
        assert_eq!(empty.total_receipts, 0);
        assert_eq!(empty.total_amount, Decimal::ZERO);
        assert_eq!(empty.latest_date, None);
    }
}

//! CSV and JSON export of stored receipts.

use std::io::{Read, Write};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ExportError;
use crate::models::receipt::{Category, Currency, Receipt};

/// Separator used to flatten item lists into one CSV cell.
pub const ITEM_SEPARATOR: &str = "; ";

/// One exported receipt, flattened for tabular output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub id: i64,
    pub vendor: String,
    pub transaction_date: NaiveDate,
    pub amount: Decimal,
    pub category: Category,
    pub currency: Currency,
    pub payment_method: String,
    pub items: String,
    pub source_file: String,
    pub confidence: f32,
    pub created_at: String,
}

impl From<&Receipt> for ExportRow {
    fn from(r: &Receipt) -> Self {
        let mut amount = r.amount.round_dp(2);
        amount.rescale(2);

        Self {
            id: r.id,
            vendor: r.vendor.clone(),
            transaction_date: r.transaction_date,
            amount,
            category: r.category,
            currency: r.currency,
            payment_method: r.payment_method.clone(),
            items: r.items.join(ITEM_SEPARATOR),
            source_file: r.source_file.clone(),
            confidence: r.confidence,
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

impl ExportRow {
    /// Item descriptions split back out of the flattened cell.
    pub fn item_list(&self) -> Vec<String> {
        self.items
            .split(ITEM_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Write receipts as CSV with a header row.
pub fn write_csv<W: Write>(writer: W, receipts: &[Receipt]) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for receipt in receipts {
        wtr.serialize(ExportRow::from(receipt))?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn to_csv(receipts: &[Receipt]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_csv(&mut buf, receipts)?;
    info!("Exported {} receipts as CSV", receipts.len());
    Ok(String::from_utf8(buf)?)
}

/// Pretty-printed JSON array of full receipt records.
pub fn to_json(receipts: &[Receipt]) -> Result<String, ExportError> {
    let json = serde_json::to_string_pretty(receipts)?;
    info!("Exported {} receipts as JSON", receipts.len());
    Ok(json)
}

/// Read rows back from an export produced by [`write_csv`].
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<ExportRow>, ExportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for (index, record) in rdr.deserialize::<ExportRow>().enumerate() {
        let row = record?;
        // Header is line 1.
        let line = index + 2;
        if row.vendor.trim().is_empty() {
            return Err(ExportError::InvalidRecord {
                row: line,
                reason: "vendor is empty".to_string(),
            });
        }
        if row.amount.is_sign_negative() && !row.amount.is_zero() {
            return Err(ExportError::InvalidRecord {
                row: line,
                reason: format!("negative amount {}", row.amount),
            });
        }
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn receipt(id: i64, vendor: &str, cents: i64, items: &[&str]) -> Receipt {
        let created = Utc.with_ymd_and_hms(2024, 3, 14, 9, 30, 0).unwrap();
        Receipt {
            id,
            vendor: vendor.to_string(),
            transaction_date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            amount: Decimal::new(cents, 2),
            items: items.iter().map(|s| s.to_string()).collect(),
            category: Category::Restaurants,
            payment_method: "Credit Card (Visa)".to_string(),
            currency: Currency::USD,
            source_file: "receipt.pdf".to_string(),
            extracted_text: "ignored in exports".to_string(),
            confidence: 0.9,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_csv_layout() {
        let csv = to_csv(&[receipt(1, "Corner Cafe", 1250, &["Latte", "Bagel"])]).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next().unwrap(),
            "id,vendor,transaction_date,amount,category,currency,payment_method,items,source_file,confidence,created_at"
        );
        assert_eq!(
            lines.next().unwrap(),
            "1,Corner Cafe,2024-03-14,12.50,restaurants,USD,Credit Card (Visa),Latte; Bagel,receipt.pdf,0.9,2024-03-14T09:30:00+00:00"
        );
    }

    #[test]
    fn test_csv_round_trip_keeps_key_fields() {
        let receipts = vec![
            receipt(1, "Joe's \"Famous\" Diner, Inc.", 123456, &["Pie"]),
            receipt(2, "Kiosk", 0, &[]),
        ];
        let csv = to_csv(&receipts).unwrap();
        let rows = read_csv(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        for (row, original) in rows.iter().zip(&receipts) {
            assert_eq!(row.vendor, original.vendor);
            assert_eq!(row.transaction_date, original.transaction_date);
            assert_eq!(row.amount, original.amount);
        }
        assert_eq!(rows[0].item_list(), vec!["Pie".to_string()]);
        assert!(rows[1].item_list().is_empty());
    }

    #[test]
    fn test_read_csv_rejects_negative_amount() {
        let data = "id,vendor,transaction_date,amount,category,currency,payment_method,items,source_file,confidence,created_at\n\
                    1,Cafe,2024-03-14,-1.00,other,USD,Cash,,a.jpg,0.5,2024-03-14T09:30:00+00:00\n";
        match read_csv(data.as_bytes()) {
            Err(ExportError::InvalidRecord { row, .. }) => assert_eq!(row, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_json_export() {
        let json = to_json(&[receipt(7, "Cafe", 500, &["Tea"])]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["id"], 7);
        assert_eq!(value[0]["vendor"], "Cafe");
        assert_eq!(value[0]["items"][0], "Tea");
    }
}

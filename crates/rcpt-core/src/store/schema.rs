//! Table and index definitions.

use rusqlite::Connection;
use tracing::debug;

use crate::error::StoreError;

/// Create the receipts table and its indexes if they do not exist yet.
pub(crate) fn create_tables(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS receipts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            vendor TEXT NOT NULL CHECK (length(trim(vendor)) > 0),
            transaction_date TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents >= 0),
            items TEXT NOT NULL DEFAULT '[]',
            category TEXT NOT NULL DEFAULT 'other',
            payment_method TEXT NOT NULL DEFAULT 'Unknown',
            currency TEXT NOT NULL DEFAULT 'USD',
            source_file TEXT NOT NULL,
            extracted_text TEXT NOT NULL DEFAULT '',
            confidence REAL NOT NULL DEFAULT 0 CHECK (confidence >= 0 AND confidence <= 1),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    create_indexes(conn)?;
    debug!("Receipt schema ready");
    Ok(())
}

fn create_indexes(conn: &Connection) -> Result<(), StoreError> {
    const INDEXES: &[(&str, &str)] = &[
        ("idx_receipts_vendor", "vendor"),
        ("idx_receipts_date", "transaction_date"),
        ("idx_receipts_amount", "amount_cents"),
        ("idx_receipts_category", "category"),
        ("idx_receipts_currency", "currency"),
        ("idx_receipts_confidence", "confidence"),
        ("idx_receipts_created_at", "created_at"),
        ("idx_receipts_vendor_date", "vendor, transaction_date"),
        ("idx_receipts_category_date", "category, transaction_date"),
    ];

    for (name, columns) in INDEXES {
        conn.execute(
            &format!("CREATE INDEX IF NOT EXISTS {name} ON receipts({columns})"),
            [],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let indexes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_receipts_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indexes, 9);
    }

    #[test]
    fn test_negative_amount_rejected_by_schema() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO receipts (vendor, transaction_date, amount_cents, source_file, created_at, updated_at)
             VALUES ('Cafe', '2024-01-01', -1, 'a.jpg', 'now', 'now')",
            [],
        );
        assert!(result.is_err());
    }
}

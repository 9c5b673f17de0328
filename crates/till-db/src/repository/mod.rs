//! # Repository Module
//!
//! One repository per Local Store collection.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Local Store Repositories                             │
//! │                                                                         │
//! │  db.products()        ProductRepository                                │
//! │  ├── get_by_id / get_by_sku / search / list / count                    │
//! │  └── upsert_many  ◄──────────── DownloadPipeline                       │
//! │                                                                         │
//! │  db.transactions()    TransactionRepository                            │
//! │  ├── record_sale  ◄──────────── Checkout::complete_sale                │
//! │  ├── list_pending ─────────────► UploadPipeline                        │
//! │  ├── mark_acknowledged ◄─────── UploadPipeline (on success)            │
//! │  └── list_in_range / list_by_cashier / end_of_day_summary              │
//! │                                                                         │
//! │  db.cursor()          CursorRepository                                 │
//! │  └── get / advance (forward only) / reset                              │
//! │                                                                         │
//! │  Every multi-row write runs inside ONE SQL transaction.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cursor;
pub mod product;
pub mod transaction;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{StorageError, StorageResult};

/// Formats a timestamp for storage.
///
/// Fixed width (nanosecond precision, `Z` suffix) so that string comparison
/// in SQL orders the same way as time.
pub(crate) fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::corrupt(column, e))
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_encoded_timestamps_sort_lexically() {
        let a = Utc.with_ymd_and_hms(2024, 5, 1, 9, 59, 59).unwrap();
        let b = a + chrono::Duration::milliseconds(1);
        let c = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        assert!(encode_timestamp(&a) < encode_timestamp(&b));
        assert!(encode_timestamp(&b) < encode_timestamp(&c));
        assert_eq!(encode_timestamp(&a).len(), encode_timestamp(&c).len());
    }

    #[test]
    fn test_timestamp_round_trip() {
        let now = Utc::now();
        let decoded = decode_timestamp("ts", &encode_timestamp(&now)).unwrap();
        assert_eq!(decoded, now);

        assert!(matches!(
            decode_timestamp("ts", "yesterday"),
            Err(StorageError::CorruptData { .. })
        ));
    }

    #[test]
    fn test_like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("co"), "co%");
        assert_eq!(like_prefix("50%_off"), "50\\%\\_off%");
    }
}

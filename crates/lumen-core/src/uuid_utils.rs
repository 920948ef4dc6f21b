//! UUIDv7 identifiers for records, keywords and labels.
//!
//! UUIDv7 embeds a millisecond Unix timestamp in the first 48 bits, so ids
//! created later sort after ids created earlier.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Creation time embedded in a UUIDv7; `None` for other versions.
pub fn extract_timestamp(uuid: &Uuid) -> Option<DateTime<Utc>> {
    if !is_v7(uuid) {
        return None;
    }

    let millis = uuid.as_bytes()[..6]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));

    Utc.timestamp_millis_opt(millis as i64).single()
}

#[inline]
pub fn is_v7(uuid: &Uuid) -> bool {
    uuid.get_version_num() == 7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_is_v7() {
        assert!(is_v7(&new_v7()));
        assert!(!is_v7(&Uuid::new_v4()));
    }

    #[test]
    fn test_extract_timestamp() {
        let before = Utc::now().timestamp_millis();
        let ts = extract_timestamp(&new_v7()).unwrap().timestamp_millis();
        let after = Utc::now().timestamp_millis();
        assert!(ts >= before && ts <= after);
        assert!(extract_timestamp(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_v7_ordering() {
        let first = new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(new_v7() > first);
    }
}

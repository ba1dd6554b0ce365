//! Identifier generation for changes and conflicts
//!
//! IDs are a millisecond timestamp followed by a short random
//! alphanumeric suffix. The timestamp prefix keeps IDs roughly sortable
//! by creation time; the suffix disambiguates bursts within one
//! millisecond.

use rand::Rng;

const SUFFIX_LEN: usize = 6;

fn alphanumeric_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect()
}

/// Generate a unique ID for a queued change
pub fn change_id() -> String {
    format!(
        "chg-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        alphanumeric_suffix()
    )
}

/// Generate a unique ID for a detected conflict
pub fn conflict_id() -> String {
    format!(
        "cfl-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        alphanumeric_suffix()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_id_format() {
        let id = change_id();
        assert!(id.starts_with("chg-"));
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = change_id();
        let b = change_id();
        assert_ne!(a, b);

        let c = conflict_id();
        assert!(c.starts_with("cfl-"));
        assert_ne!(a, c);
    }
}

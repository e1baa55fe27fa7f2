//! ID utilities (ULIDs, short tokens).

use rand::{distributions::Alphanumeric, Rng};
use ulid::Ulid;

/// Generate a short game ID from a ULID.
///
/// A ULID string is 10 timestamp characters followed by 16 random ones;
/// the random tail is what keeps ids minted in the same millisecond
/// distinct, so that is the part we keep.
pub fn new_game_id() -> String {
    let ulid = Ulid::new().to_string();
    ulid[ulid.len() - 10..].to_string()
}

/// Generate a connection identifier (URL-safe alphanumeric).
pub fn new_conn_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_ids_minted_back_to_back_differ() {
        let a = new_game_id();
        let b = new_game_id();
        assert_eq!(a.len(), 10);
        assert_ne!(a, b);
    }

    #[test]
    fn conn_ids_are_distinct_url_safe_tokens() {
        let a = new_conn_id();
        let b = new_conn_id();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}

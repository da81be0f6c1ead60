/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Milliseconds elapsed from `since` to `now`, floored at zero.
///
/// A clock that moves backwards reports zero elapsed time rather than a
/// negative value.
pub fn elapsed_ms(since: Timestamp, now: Timestamp) -> i64 {
    (now - since).num_milliseconds().max(0)
}

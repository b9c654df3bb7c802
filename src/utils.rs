use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Unix seconds as an RFC 3339 UTC string; empty when absent or out of range.
pub fn rfc3339(ts: Option<i64>) -> String {
    ts.and_then(|t| OffsetDateTime::from_unix_timestamp(t).ok())
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_default()
}

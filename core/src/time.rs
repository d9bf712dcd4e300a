//! Time related utils.

use crate::{Error, Result};
use chrono::SecondsFormat;
use chrono::Utc;

/// DateTime is the alias for `chrono::DateTime<Utc>`.
pub type DateTime = chrono::DateTime<Utc>;

/// Create datetime of now.
pub fn now() -> DateTime {
    Utc::now()
}

/// Format time into http date: `Sun, 06 Nov 1994 08:49:37 GMT`
///
/// ## Note
///
/// HTTP date is slightly different from RFC2822.
///
/// - Timezone is fixed to GMT.
/// - Day must be 2 digit.
pub fn format_http_date(t: DateTime) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Format time into RFC 3339 with as many fractional digits as needed: `2022-03-01T08:12:34.1234567Z`
///
/// The table service keeps 100ns precision; keeping every digit chrono has
/// makes formatting and parsing lossless.
pub fn format_rfc3339(t: DateTime) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse RFC 3339 time, accepting any offset and normalizing to UTC.
pub fn parse_rfc3339(s: &str) -> Result<DateTime> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|v| v.with_timezone(&Utc))
        .map_err(|e| Error::decode(format!("parse '{s}' into rfc3339 failed")).with_source(e))
}

use chrono::{DateTime, Utc};

/// Format an epoch time as a PDF date string: `D:YYYYMMDDHHmmSS+00'00'`.
///
/// Times are rendered in UTC so output is independent of the host
/// timezone. Out-of-range epochs fall back to the epoch origin.
pub fn pdf_date(epoch: i64) -> String {
    let when = DateTime::<Utc>::from_timestamp(epoch, 0)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).expect("epoch origin"));
    format!("D:{}+00'00'", when.format("%Y%m%d%H%M%S"))
}

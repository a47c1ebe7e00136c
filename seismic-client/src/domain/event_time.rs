use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

/// Offset of the agency's local time. Fixed, no daylight-saving rules.
pub const LOCAL_UTC_OFFSET_HOURS: i8 = -5;

/// An upstream event timestamp rendered as UTC and agency-local ISO-8601.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTimes {
    pub epoch_ms: i64,
    pub utc: String,
    pub local: String,
}

impl EventTimes {
    /// Convert epoch milliseconds. Returns `None` for instants RFC 3339
    /// cannot represent (years outside 0001..=9998 after shifting).
    pub fn from_epoch_ms(epoch_ms: i64) -> Option<Self> {
        let nanos = i128::from(epoch_ms).checked_mul(1_000_000)?;
        let utc = OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()?;
        if !(1..=9998).contains(&utc.year()) {
            return None;
        }

        let offset = UtcOffset::from_hms(LOCAL_UTC_OFFSET_HOURS, 0, 0).ok()?;
        let local = utc.to_offset(offset);

        Some(Self {
            epoch_ms,
            utc: utc.format(&Rfc3339).ok()?,
            local: local.format(&Rfc3339).ok()?,
        })
    }
}

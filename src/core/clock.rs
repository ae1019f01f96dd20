use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};

/// Wall clock pinned to the operator's UTC offset.
///
/// The dialer console resets its daily counter on local time, so every
/// weekday decision is taken in this offset rather than in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZoneClock {
    offset: Option<FixedOffset>,
}

impl ZoneClock {
    pub fn new(offset: Option<FixedOffset>) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        match self.offset {
            Some(offset) => offset,
            None => *Local::now().offset(),
        }
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset())
    }

    /// Re-express a timestamp in the operator's offset.
    pub fn localize(&self, at: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset())
    }

    /// Parse `data_coleta`: RFC 3339, or a naive ISO-8601 timestamp taken to be
    /// in the operator's offset.
    pub fn parse_timestamp(&self, raw: &str) -> Option<DateTime<FixedOffset>> {
        let raw = raw.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(self.localize(at));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()?;
        self.offset().from_local_datetime(&naive).single()
    }
}

/// Parse a `±HH:MM` offset such as `-03:00`.
pub fn parse_offset(raw: &str) -> Option<FixedOffset> {
    raw.trim().parse::<FixedOffset>().ok()
}

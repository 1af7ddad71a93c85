use chrono::{DateTime, Duration, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Inclusive window `[from, from + days]` used by reminder scans.
pub fn window_end(from: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    from + Duration::days(days.max(0))
}

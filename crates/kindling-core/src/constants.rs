/// Kindling system version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Rating recorded when the caller does not supply one.
pub const DEFAULT_RATING: f64 = 3.0;

/// Upper bound of the rating scale; seeds cold-start popularity scores.
pub const MAX_RATING: f64 = 5.0;

/// Age after which a cached co-occurrence model is considered stale (seconds).
pub const DEFAULT_STALENESS_WINDOW_SECS: u64 = 3600;

/// Recommendations returned when a request does not name a count.
pub const DEFAULT_MAX_RECOMMENDATIONS: usize = 50;

//! Settings for the SQL generator.
//!
//! [`Settings`] holds the few knobs the generator exposes. Every field has a
//! default, so a configuration file only needs to name what it changes (see
//! [`settings_loader`](crate::settings_loader)).

use serde::{Deserialize, Serialize};

/// Default window, in rows, within which `register_offset` reuses an
/// existing cached offset instead of materialising a new one.
pub const DEFAULT_OFFSET_TOLERANCE: usize = 100_000;

/// The complete set of generator settings.
///
/// # Examples
///
/// ```
/// use objstore_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.platform, "postgresql");
/// assert_eq!(settings.offset_tolerance, 100_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    // ── Database ─────────────────────────────────────────────────────

    /// The database platform SQL is generated for
    /// (`"postgresql"`, `"mysql"` or `"sqlite"`).
    pub platform: String,

    // ── Offset cache ─────────────────────────────────────────────────

    /// Rows between a requested offset and an already cached one within
    /// which no new seek entry is created.
    pub offset_tolerance: usize,

    // ── Logging ──────────────────────────────────────────────────────

    /// Whether debug mode is enabled (pretty log output instead of JSON).
    pub debug: bool,
    /// The log level filter (e.g. "info", "debug", "objstore_sql=trace").
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            platform: "postgresql".to_string(),
            offset_tolerance: DEFAULT_OFFSET_TOLERANCE,
            debug: false,
            log_level: "info".to_string(),
        }
    }
}

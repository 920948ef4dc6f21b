//! Centralized default constants for lumen.
//!
//! **This module is the single source of truth** for shared default values.
//! [`crate::config::ReconcileConfig`] starts from these and may override them
//! from the environment.

// =============================================================================
// TEXT FIELDS
// =============================================================================

/// Maximum characters stored for a title.
pub const CLIP_TITLE: usize = 300;

/// Maximum characters stored for a description.
pub const CLIP_DESCRIPTION: usize = 16_000;

/// Maximum characters stored for free-text detail fields (keywords, subject, artist).
pub const CLIP_DETAILS: usize = 2048;

/// Sentinel title used when nothing better can be synthesized.
pub const TITLE_UNKNOWN: &str = "Unknown";

// =============================================================================
// CAPTURE TIME
// =============================================================================

/// Capture timestamps before this calendar year are treated as missing.
pub const MIN_PLAUSIBLE_YEAR: i32 = 1000;

/// Stored value for an unknown year or month.
pub const DATE_PART_UNKNOWN: i32 = -1;

// =============================================================================
// LABELS
// =============================================================================

/// Uncertainty at or above this value is invalid / no-confidence.
pub const UNCERTAINTY_INVALID: i32 = 100;

/// A label is usable for titles only at or below this uncertainty.
pub const TITLE_LABEL_MAX_UNCERTAINTY: i32 = 85;

/// A label is usable for titles only at or above this priority.
pub const TITLE_LABEL_MIN_PRIORITY: i32 = -1;

// =============================================================================
// TITLE HEURISTICS
// =============================================================================

/// Place names longer than this never get a city appended.
pub const TITLE_LONG_PLACE_NAME: usize = 45;

/// Place names longer than this make the city redundant.
pub const TITLE_PLACE_NAME_REDUNDANT: usize = 20;

/// Cities longer than this are dropped next to a place name.
pub const TITLE_PLACE_CITY_REDUNDANT: usize = 16;

/// Cities longer than this are used without a country.
pub const TITLE_LONG_CITY: usize = 20;

/// Cities longer than this are replaced by the country next to a label.
pub const TITLE_LABEL_LONG_CITY: usize = 16;

// =============================================================================
// EVENTS
// =============================================================================

/// Default broadcast buffer for the event bus.
pub const EVENT_BUS_CAPACITY: usize = 256;

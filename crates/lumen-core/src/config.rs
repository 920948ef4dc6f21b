//! Reconciliation engine configuration.
//!
//! Values default to [`crate::defaults`] and can be overridden through
//! `LUMEN_*` environment variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `LUMEN_CLIP_TITLE` | `clip_title` |
//! | `LUMEN_CLIP_DESCRIPTION` | `clip_description` |
//! | `LUMEN_CLIP_DETAILS` | `clip_details` |
//! | `LUMEN_TITLE_UNKNOWN` | `title_unknown` |
//! | `LUMEN_TITLE_LABEL_MAX_UNCERTAINTY` | `title_label_max_uncertainty` |
//! | `LUMEN_TITLE_LABEL_MIN_PRIORITY` | `title_label_min_priority` |
//! | `LUMEN_EVENT_BUS_CAPACITY` | `event_bus_capacity` |

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::defaults;
use crate::error::{Error, Result};
use crate::events::EventBus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    pub clip_title: usize,
    pub clip_description: usize,
    pub clip_details: usize,
    pub title_unknown: String,
    pub title_label_max_uncertainty: i32,
    pub title_label_min_priority: i32,
    pub title_label_long_city: usize,
    pub title_long_place_name: usize,
    pub title_place_name_redundant: usize,
    pub title_place_city_redundant: usize,
    pub title_long_city: usize,
    pub event_bus_capacity: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            clip_title: defaults::CLIP_TITLE,
            clip_description: defaults::CLIP_DESCRIPTION,
            clip_details: defaults::CLIP_DETAILS,
            title_unknown: defaults::TITLE_UNKNOWN.to_string(),
            title_label_max_uncertainty: defaults::TITLE_LABEL_MAX_UNCERTAINTY,
            title_label_min_priority: defaults::TITLE_LABEL_MIN_PRIORITY,
            title_label_long_city: defaults::TITLE_LABEL_LONG_CITY,
            title_long_place_name: defaults::TITLE_LONG_PLACE_NAME,
            title_place_name_redundant: defaults::TITLE_PLACE_NAME_REDUNDANT,
            title_place_city_redundant: defaults::TITLE_PLACE_CITY_REDUNDANT,
            title_long_city: defaults::TITLE_LONG_CITY,
            event_bus_capacity: defaults::EVENT_BUS_CAPACITY,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                debug!(key, value = %raw, "Ignoring unparsable config override");
                default
            }
        },
        Err(_) => default,
    }
}

impl ReconcileConfig {
    /// Load configuration from `LUMEN_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            clip_title: env_or("LUMEN_CLIP_TITLE", d.clip_title),
            clip_description: env_or("LUMEN_CLIP_DESCRIPTION", d.clip_description),
            clip_details: env_or("LUMEN_CLIP_DETAILS", d.clip_details),
            title_unknown: env_or("LUMEN_TITLE_UNKNOWN", d.title_unknown),
            title_label_max_uncertainty: env_or(
                "LUMEN_TITLE_LABEL_MAX_UNCERTAINTY",
                d.title_label_max_uncertainty,
            ),
            title_label_min_priority: env_or(
                "LUMEN_TITLE_LABEL_MIN_PRIORITY",
                d.title_label_min_priority,
            ),
            event_bus_capacity: env_or("LUMEN_EVENT_BUS_CAPACITY", d.event_bus_capacity),
            ..d
        }
    }

    /// [`Self::from_env`] followed by [`Self::validate`].
    pub fn load() -> Result<Self> {
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// A fresh event bus sized by `event_bus_capacity`.
    pub fn event_bus(&self) -> EventBus {
        EventBus::new(self.event_bus_capacity)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.clip_title == 0 || self.clip_description == 0 || self.clip_details == 0 {
            return Err(Error::Config(
                "clip lengths must be greater than zero".to_string(),
            ));
        }

        if !(0..defaults::UNCERTAINTY_INVALID).contains(&self.title_label_max_uncertainty) {
            return Err(Error::Config(format!(
                "title_label_max_uncertainty must be in 0..{}, got {}",
                defaults::UNCERTAINTY_INVALID,
                self.title_label_max_uncertainty
            )));
        }

        if self.title_unknown.trim().is_empty() {
            return Err(Error::Config("title_unknown cannot be empty".to_string()));
        }

        if self.event_bus_capacity == 0 {
            return Err(Error::Config(
                "event_bus_capacity must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReconcileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.clip_title, 300);
        assert_eq!(config.title_unknown, "Unknown");
    }

    #[test]
    fn test_validate_rejects_zero_clip() {
        let config = ReconcileConfig {
            clip_title: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_invalid_uncertainty() {
        let config = ReconcileConfig {
            title_label_max_uncertainty: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_override() {
        env::set_var("LUMEN_CLIP_DETAILS", "512");
        env::set_var("LUMEN_EVENT_BUS_CAPACITY", "not-a-number");
        let config = ReconcileConfig::from_env();
        env::remove_var("LUMEN_CLIP_DETAILS");
        env::remove_var("LUMEN_EVENT_BUS_CAPACITY");

        assert_eq!(config.clip_details, 512);
        assert_eq!(config.event_bus_capacity, defaults::EVENT_BUS_CAPACITY);
    }

    #[test]
    fn test_load_rejects_invalid_override() {
        env::set_var("LUMEN_CLIP_TITLE", "0");
        let result = ReconcileConfig::load();
        env::remove_var("LUMEN_CLIP_TITLE");

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_event_bus_uses_configured_capacity() {
        let config = ReconcileConfig {
            event_bus_capacity: 1,
            ..Default::default()
        };
        let bus = config.event_bus();
        let mut rx = bus.subscribe();

        bus.emit(crate::events::ServerEvent::LabelCountChanged { delta: 1 });
        bus.emit(crate::events::ServerEvent::LabelCountChanged { delta: 2 });

        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Lagged(1))
        ));
    }
}

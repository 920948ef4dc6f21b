//! Data source tags governing overwrite precedence.
//!
//! Every provenance-tracked field stores the [`Source`] that last set it.
//! `Manual` dominates everything; `Auto` yields to everything; any other
//! source is sticky and only replaced by itself or by `Manual`.

use serde::{Deserialize, Serialize};

/// Actor or pipeline that produced a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Placeholder or synthesized value; anything may replace it.
    #[default]
    Auto,
    /// Set by a user through a form.
    Manual,
    /// Embedded file metadata (EXIF and similar).
    Meta,
    /// XMP sidecar files.
    Xmp,
    /// Derived from the file or folder name.
    Name,
    /// Reverse geocoding.
    Location,
    /// Automatic image classification.
    Image,
}

impl Source {
    /// Short tag used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Meta => "meta",
            Self::Xmp => "xmp",
            Self::Name => "name",
            Self::Location => "location",
            Self::Image => "image",
        }
    }

    /// All sources, `Auto` first.
    pub const ALL: [Source; 7] = [
        Source::Auto,
        Source::Manual,
        Source::Meta,
        Source::Xmp,
        Source::Name,
        Source::Location,
        Source::Image,
    ];

    /// Whether a value held under `self` may be replaced by a value from `candidate`.
    pub fn yields_to(self, candidate: Source) -> bool {
        match (self, candidate) {
            (Source::Auto, _) | (_, Source::Manual) => true,
            (current, candidate) => current == candidate,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            "meta" | "exif" => Ok(Self::Meta),
            "xmp" => Ok(Self::Xmp),
            "name" => Ok(Self::Name),
            "location" => Ok(Self::Location),
            "image" => Ok(Self::Image),
            _ => Err(format!("Invalid source: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_always_wins() {
        for current in Source::ALL {
            assert!(current.yields_to(Source::Manual), "{current} should yield");
        }
    }

    #[test]
    fn test_auto_yields_to_everything() {
        for candidate in Source::ALL {
            assert!(Source::Auto.yields_to(candidate));
        }
    }

    #[test]
    fn test_non_manual_sources_are_sticky() {
        assert!(Source::Meta.yields_to(Source::Meta));
        assert!(!Source::Meta.yields_to(Source::Location));
        assert!(!Source::Location.yields_to(Source::Image));
        assert!(!Source::Manual.yields_to(Source::Meta));
        assert!(!Source::Xmp.yields_to(Source::Auto));
    }

    #[test]
    fn test_legacy_tags_parse() {
        assert_eq!("".parse::<Source>().unwrap(), Source::Auto);
        assert_eq!("EXIF".parse::<Source>().unwrap(), Source::Meta);
        assert!("bogus".parse::<Source>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&Source::Location).unwrap();
        assert_eq!(json, "\"location\"");
    }
}

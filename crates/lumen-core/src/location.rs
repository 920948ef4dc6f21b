//! Reverse-geocoding result as consumed by the title synthesizer.

use serde::{Deserialize, Serialize};

use crate::text;

/// A resolved place for a record's coordinates.
///
/// Produced by an external geocoder and handed to the engine as a plain
/// value; the engine never resolves coordinates itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    /// Point of interest or street-level name, may be empty.
    pub name: String,
    pub city: String,
    pub state: String,
    /// ISO 3166-1 alpha-2 code.
    pub country_code: String,
    pub country_name: String,
}

impl ResolvedLocation {
    pub fn name(&self) -> &str {
        self.name.trim()
    }

    pub fn city(&self) -> &str {
        self.city.trim()
    }

    pub fn country(&self) -> &str {
        self.country_name.trim()
    }

    /// Whether the city name has more than `limit` characters.
    pub fn long_city_over(&self, limit: usize) -> bool {
        self.city().chars().count() > limit
    }

    /// Whether the city name already appears within `text`.
    pub fn city_contains(&self, text: &str) -> bool {
        !self.city().is_empty() && text.contains(self.city())
    }

    /// Searchable keywords describing this place.
    pub fn keywords(&self) -> Vec<String> {
        text::unique_words(
            [&self.name, &self.city, &self.state, &self.country_name]
                .into_iter()
                .flat_map(|s| text::keywords(s)),
        )
    }
}

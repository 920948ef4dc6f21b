//! Field reconciler: the single overwrite rule shared by every
//! provenance-tracked field.
//!
//! A candidate is accepted iff it passes the field's validity filter and the
//! current source yields to the candidate source (see
//! [`Source::yields_to`]). An empty current text value is always
//! replaceable. Rejections are silent; callers inspect
//! [`Reconciled::accepted`].

use chrono::{Datelike, NaiveDateTime, SubsecRound};
use tracing::debug;

use crate::defaults::{CLIP_DESCRIPTION, CLIP_TITLE, MIN_PLAUSIBLE_YEAR};
use crate::models::{CaptureTime, Coordinates, MediaRecord, Tracked};
use crate::provenance::Source;
use crate::text;

/// Outcome of one reconciliation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled<T> {
    pub value: T,
    pub source: Source,
    pub accepted: bool,
}

/// Field-specific validity filter.
pub trait FieldRule {
    /// Stored value.
    type Value;
    /// Incoming value before filtering.
    type Candidate;

    /// Field name used in logs.
    fn name(&self) -> &'static str;

    /// Filter and normalize a candidate; `None` means "no candidate".
    fn admit(&self, current: &Self::Value, candidate: Self::Candidate) -> Option<Self::Value>;

    /// Whether the current value counts as unset regardless of its source.
    fn is_unset(&self, _current: &Self::Value) -> bool {
        false
    }
}

/// Decide whether `candidate` replaces `current`.
pub fn try_update<R: FieldRule>(
    rule: &R,
    current: R::Value,
    current_source: Source,
    candidate: R::Candidate,
    candidate_source: Source,
) -> Reconciled<R::Value> {
    let Some(value) = rule.admit(&current, candidate) else {
        debug!(
            subsystem = "engine",
            component = "reconciler",
            field = rule.name(),
            source = %candidate_source,
            "Candidate rejected by validity filter"
        );
        return Reconciled {
            value: current,
            source: current_source,
            accepted: false,
        };
    };

    if !rule.is_unset(&current) && !current_source.yields_to(candidate_source) {
        debug!(
            subsystem = "engine",
            component = "reconciler",
            field = rule.name(),
            source = %candidate_source,
            current_source = %current_source,
            "Candidate rejected by precedence"
        );
        return Reconciled {
            value: current,
            source: current_source,
            accepted: false,
        };
    }

    Reconciled {
        value,
        source: candidate_source,
        accepted: true,
    }
}

impl<T: Default> Tracked<T> {
    /// Run the reconciler against this field and store the outcome.
    pub fn reconcile<R>(&mut self, rule: &R, candidate: R::Candidate, source: Source) -> bool
    where
        R: FieldRule<Value = T>,
    {
        let current_source = self.source();
        let current = self.take();
        let outcome = try_update(rule, current, current_source, candidate, source);
        self.replace(outcome.value, outcome.source);
        outcome.accepted
    }
}

// =============================================================================
// RULES
// =============================================================================

/// Title and description: non-empty after trimming, clipped to `max_len`.
#[derive(Debug, Clone, Copy)]
pub struct TextRule {
    pub field: &'static str,
    pub max_len: usize,
}

impl TextRule {
    pub fn title(max_len: usize) -> Self {
        Self {
            field: "title",
            max_len,
        }
    }

    pub fn description(max_len: usize) -> Self {
        Self {
            field: "description",
            max_len,
        }
    }
}

impl FieldRule for TextRule {
    type Value = String;
    type Candidate = String;

    fn name(&self) -> &'static str {
        self.field
    }

    fn admit(&self, _current: &String, candidate: String) -> Option<String> {
        let clipped = text::clip(&candidate, self.max_len);
        (!clipped.is_empty()).then_some(clipped)
    }

    fn is_unset(&self, current: &String) -> bool {
        current.is_empty()
    }
}

/// Incoming capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureCandidate {
    pub at: chrono::DateTime<chrono::Utc>,
    pub local: Option<NaiveDateTime>,
    pub zone: Option<String>,
}

/// Capture time: plausible year required, local time falls back to UTC,
/// zone only replaced by a non-empty value.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureTimeRule;

impl FieldRule for CaptureTimeRule {
    type Value = CaptureTime;
    type Candidate = CaptureCandidate;

    fn name(&self) -> &'static str {
        "captured_at"
    }

    fn admit(&self, current: &CaptureTime, candidate: CaptureCandidate) -> Option<CaptureTime> {
        if candidate.at.year() < MIN_PLAUSIBLE_YEAR {
            return None;
        }

        let at = candidate.at.round_subsecs(0);
        let local = candidate
            .local
            .filter(|l| l.year() >= MIN_PLAUSIBLE_YEAR)
            .map(|l| l.round_subsecs(0))
            .unwrap_or_else(|| at.naive_utc());
        let zone = candidate
            .zone
            .filter(|z| !z.trim().is_empty())
            .unwrap_or_else(|| current.zone.clone());

        Some(CaptureTime { at, local, zone })
    }
}

/// Coordinates: `(0, 0)` means no data; altitude is copied as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateRule;

impl FieldRule for CoordinateRule {
    type Value = Coordinates;
    type Candidate = Coordinates;

    fn name(&self) -> &'static str {
        "coordinates"
    }

    fn admit(&self, _current: &Coordinates, candidate: Coordinates) -> Option<Coordinates> {
        if candidate.latitude == 0.0 && candidate.longitude == 0.0 {
            return None;
        }
        Some(candidate)
    }
}

// =============================================================================
// RECORD SETTERS
// =============================================================================

impl MediaRecord {
    /// Offer a title candidate; returns whether it was accepted.
    pub fn set_title(&mut self, title: impl Into<String>, source: Source) -> bool {
        self.title
            .reconcile(&TextRule::title(CLIP_TITLE), title.into(), source)
    }

    pub fn set_description(&mut self, description: impl Into<String>, source: Source) -> bool {
        self.description.reconcile(
            &TextRule::description(CLIP_DESCRIPTION),
            description.into(),
            source,
        )
    }

    /// Offer a capture time; an accepted one re-derives year and month.
    pub fn set_captured_at(&mut self, candidate: CaptureCandidate, source: Source) -> bool {
        let accepted = self.captured_at.reconcile(&CaptureTimeRule, candidate, source);
        if accepted {
            self.update_year_month();
        }
        accepted
    }

    pub fn set_coordinates(&mut self, coordinates: Coordinates, source: Source) -> bool {
        self.coordinates
            .reconcile(&CoordinateRule, coordinates, source)
    }
}

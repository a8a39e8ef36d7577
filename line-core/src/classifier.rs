//! Line-state classification over the most recent sample window.
//!
//! The classifier looks at the voltage across the pair (tip minus ring) for
//! each aligned sample in the window. Steady on-hook and off-hook states need
//! every sample inside their band; ringing needs only a few samples whose
//! magnitude clears the ringing threshold, since the 20 Hz ring signal swings
//! through both steady bands on its way between peaks. Anything else leaves
//! the previously decided state in place.

use core::fmt;

use crate::history::{LinePair, SamplePair};

/// Electrical state of the line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum LineState {
    /// Assumed at start-up; never measured before the first window.
    #[default]
    OnHook,
    OffHook,
    Ringing,
}

impl fmt::Display for LineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LineState::OnHook => "on-hook",
            LineState::OffHook => "off-hook",
            LineState::Ringing => "ringing",
        })
    }
}

impl LineState {
    /// Parses the labels produced by the `Display` impl.
    pub fn from_tag(tag: &str) -> Option<Self> {
        if tag.eq_ignore_ascii_case("on-hook") {
            Some(LineState::OnHook)
        } else if tag.eq_ignore_ascii_case("off-hook") {
            Some(LineState::OffHook)
        } else if tag.eq_ignore_ascii_case("ringing") {
            Some(LineState::Ringing)
        } else {
            None
        }
    }
}

/// Inclusive voltage band.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VoltageBand {
    pub min: i16,
    pub max: i16,
}

impl VoltageBand {
    pub const fn new(min: i16, max: i16) -> Self {
        Self { min, max }
    }

    /// Returns `true` when `volts` lies within the band, bounds included.
    pub const fn contains(&self, volts: i32) -> bool {
        volts >= self.min as i32 && volts <= self.max as i32
    }

    /// Returns `true` when `min <= max`.
    pub const fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}

/// Pair voltage while the handset rests.
pub const ON_HOOK_BAND: VoltageBand = VoltageBand::new(35, 60);
/// Pair voltage while the loop is closed.
pub const OFF_HOOK_BAND: VoltageBand = VoltageBand::new(-10, 20);
/// Magnitude a sample must exceed to count towards ringing.
pub const RINGING_MAGNITUDE: i16 = 70;
/// Ringing samples needed in one window.
pub const RINGING_MIN_COUNT: usize = 2;
/// Samples per window: 50 ms at the 5 ms sample interval, one full 20 Hz cycle.
pub const CLASSIFIER_WINDOW: usize = 10;

/// Tunable thresholds for the classifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClassifierConfig {
    pub on_hook: VoltageBand,
    pub off_hook: VoltageBand,
    pub ringing_magnitude: i16,
    pub ringing_min_count: usize,
    pub window: usize,
}

/// Thresholds calibrated against the current central office line.
pub const DEFAULT_CLASSIFIER: ClassifierConfig = ClassifierConfig {
    on_hook: ON_HOOK_BAND,
    off_hook: OFF_HOOK_BAND,
    ringing_magnitude: RINGING_MAGNITUDE,
    ringing_min_count: RINGING_MIN_COUNT,
    window: CLASSIFIER_WINDOW,
};

impl Default for ClassifierConfig {
    fn default() -> Self {
        DEFAULT_CLASSIFIER
    }
}

/// Accumulators gathered while scanning one window.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WindowSummary {
    pub samples: usize,
    pub on_hook: bool,
    pub off_hook: bool,
    pub ringing_count: usize,
}

/// Result of classifying one window.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Classification {
    Decided(LineState),
    /// The window matched no rule; keep the previous state.
    NoChange,
}

impl Classification {
    /// State to hold after this classification.
    pub const fn resolve(self, previous: LineState) -> LineState {
        match self {
            Classification::Decided(state) => state,
            Classification::NoChange => previous,
        }
    }

    /// Returns the decided state, if any.
    pub const fn decided(self) -> Option<LineState> {
        match self {
            Classification::Decided(state) => Some(state),
            Classification::NoChange => None,
        }
    }
}

impl ClassifierConfig {
    /// Scans `pairs` and gathers the band/ringing accumulators.
    pub fn summarize<I>(&self, pairs: I) -> WindowSummary
    where
        I: IntoIterator<Item = SamplePair>,
    {
        let mut summary = WindowSummary {
            samples: 0,
            on_hook: true,
            off_hook: true,
            ringing_count: 0,
        };

        for pair in pairs {
            let delta = pair.delta();
            summary.samples += 1;
            summary.on_hook &= self.on_hook.contains(delta);
            summary.off_hook &= self.off_hook.contains(delta);
            if delta.abs() > i32::from(self.ringing_magnitude) {
                summary.ringing_count += 1;
            }
        }

        summary
    }

    /// Applies the decision priority (on-hook, off-hook, ringing) to a summary.
    pub const fn decide(&self, summary: &WindowSummary) -> Classification {
        if summary.samples == 0 {
            Classification::NoChange
        } else if summary.on_hook {
            Classification::Decided(LineState::OnHook)
        } else if summary.off_hook {
            Classification::Decided(LineState::OffHook)
        } else if summary.ringing_count >= self.ringing_min_count {
            Classification::Decided(LineState::Ringing)
        } else {
            Classification::NoChange
        }
    }

    /// Classifies an explicit window of aligned samples.
    pub fn classify<I>(&self, pairs: I) -> Classification
    where
        I: IntoIterator<Item = SamplePair>,
    {
        self.decide(&self.summarize(pairs))
    }

    /// Classifies the newest `window` pairs held by `pair`.
    pub fn classify_history<const C: usize>(&self, pair: &LinePair<C>) -> Classification {
        self.classify(pair.latest_pairs(self.window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(deltas: &[i32]) -> impl Iterator<Item = SamplePair> + '_ {
        deltas.iter().map(|&delta| {
            let ring = -48_i16;
            #[allow(clippy::cast_possible_truncation)]
            let tip = (i32::from(ring) + delta) as i16;
            SamplePair::new(tip, ring)
        })
    }

    #[test]
    fn band_edges_are_inclusive() {
        let classifier = DEFAULT_CLASSIFIER;
        assert_eq!(
            classifier.classify(window(&[35, 60, 35, 60])),
            Classification::Decided(LineState::OnHook)
        );
        assert_eq!(
            classifier.classify(window(&[-10, 20, -10, 20])),
            Classification::Decided(LineState::OffHook)
        );
    }

    #[test]
    fn single_outlier_blocks_steady_decisions() {
        let classifier = DEFAULT_CLASSIFIER;
        assert_eq!(
            classifier.classify(window(&[45, 45, 45, 61, 45])),
            Classification::NoChange
        );
        assert_eq!(
            classifier.classify(window(&[5, 5, 21, 5, 5])),
            Classification::NoChange
        );
    }

    #[test]
    fn ringing_needs_two_samples_beyond_magnitude() {
        let classifier = DEFAULT_CLASSIFIER;
        assert_eq!(
            classifier.classify(window(&[45, 80, 45, 45])),
            Classification::NoChange
        );
        assert_eq!(
            classifier.classify(window(&[80, 0, -80, 0])),
            Classification::Decided(LineState::Ringing)
        );
        assert_eq!(
            classifier.classify(window(&[71, -71, 30, 30])),
            Classification::Decided(LineState::Ringing)
        );
        assert_eq!(
            classifier.classify(window(&[70, -70, 30, 30])),
            Classification::NoChange
        );
    }

    #[test]
    fn steady_bands_take_priority_over_ringing_count() {
        let classifier = ClassifierConfig {
            ringing_magnitude: 10,
            ..DEFAULT_CLASSIFIER
        };
        assert_eq!(
            classifier.classify(window(&[40, 50, 55])),
            Classification::Decided(LineState::OnHook)
        );
    }

    #[test]
    fn no_change_resolves_to_previous_state() {
        for previous in [LineState::OnHook, LineState::OffHook, LineState::Ringing] {
            assert_eq!(Classification::NoChange.resolve(previous), previous);
        }
        assert_eq!(
            Classification::Decided(LineState::OffHook).resolve(LineState::OnHook),
            LineState::OffHook
        );
    }

    #[test]
    fn empty_window_is_not_a_decision() {
        let classifier = DEFAULT_CLASSIFIER;
        assert_eq!(classifier.classify(window(&[])), Classification::NoChange);
    }

    #[test]
    fn summary_counts_samples_and_ringing() {
        let summary = DEFAULT_CLASSIFIER.summarize(window(&[90, -90, 45, 0]));
        assert_eq!(summary.samples, 4);
        assert!(!summary.on_hook);
        assert!(!summary.off_hook);
        assert_eq!(summary.ringing_count, 2);
    }

    #[test]
    fn classify_history_uses_only_the_newest_window() {
        let mut pair = LinePair::<16>::new();
        for _ in 0..12 {
            pair.record_volts(SamplePair::new(-3, -48));
        }
        for _ in 0..CLASSIFIER_WINDOW {
            pair.record_volts(SamplePair::new(-43, -48));
        }
        assert_eq!(
            DEFAULT_CLASSIFIER.classify_history(&pair),
            Classification::Decided(LineState::OffHook)
        );
    }

    #[test]
    fn state_tags_round_trip_through_display() {
        let mut buffer: heapless::String<16> = heapless::String::new();
        for state in [LineState::OnHook, LineState::OffHook, LineState::Ringing] {
            buffer.clear();
            core::fmt::write(&mut buffer, format_args!("{state}")).unwrap();
            assert_eq!(LineState::from_tag(&buffer), Some(state));
        }
        assert_eq!(LineState::from_tag("dialing"), None);
    }
}

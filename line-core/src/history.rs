//! Per-conductor sample history.
//!
//! Each conductor keeps a fixed-capacity ring of its most recent voltages.
//! The two conductors of a pair are only ever advanced together through
//! [`LinePair::record`], so the n-th oldest entry of the tip history and the
//! n-th oldest entry of the ring history always come from the same cycle.

use heapless::{HistoryBuf, OldestOrdered};

use crate::acquisition::ScalingNetwork;

/// Identifier for the two conductors of the pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConductorId {
    Tip,
    Ring,
}

impl ConductorId {
    /// Deterministic index for lookups into [`ALL_CONDUCTORS`].
    pub const fn as_index(self) -> usize {
        match self {
            ConductorId::Tip => 0,
            ConductorId::Ring => 1,
        }
    }

    /// Attempts to construct a [`ConductorId`] from a raw index.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ConductorId::Tip),
            1 => Some(ConductorId::Ring),
            _ => None,
        }
    }
}

/// Metadata describing how a conductor is routed to the ADC.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConductorLine {
    pub id: ConductorId,
    pub name: &'static str,
    pub mcu_pin: &'static str,
    pub adc_channel: u8,
}

impl ConductorLine {
    pub const fn new(id: ConductorId, name: &'static str, mcu_pin: &'static str, adc_channel: u8) -> Self {
        Self {
            id,
            name,
            mcu_pin,
            adc_channel,
        }
    }
}

/// Compile-time catalog of both conductors.
pub const ALL_CONDUCTORS: [ConductorLine; 2] = [
    ConductorLine::new(ConductorId::Tip, "TIP", "PA0", 0),
    ConductorLine::new(ConductorId::Ring, "RING", "PA1", 1),
];

/// Retrieve conductor metadata by identifier.
pub const fn conductor_by_id(id: ConductorId) -> ConductorLine {
    ALL_CONDUCTORS[id.as_index()]
}

/// Ring of the most recent `C` voltages for one conductor.
#[derive(Clone)]
pub struct SampleHistory<const C: usize> {
    ring: HistoryBuf<i16, C>,
    cursor: usize,
}

impl<const C: usize> SampleHistory<C> {
    /// Creates an empty history.
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            cursor: 0,
        }
    }

    /// Appends a sample, overwriting the oldest one once the ring is full.
    pub fn push(&mut self, volts: i16) {
        self.ring.write(volts);
        self.cursor = (self.cursor + 1) % C;
    }

    /// Slot the next sample will overwrite. Once warm this is also the slot of
    /// the oldest retained sample.
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of valid samples currently held.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no sample has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Fixed capacity of the ring.
    pub const fn capacity(&self) -> usize {
        C
    }

    /// Returns `true` once `C` samples have been recorded.
    pub fn is_warm(&self) -> bool {
        self.ring.is_full()
    }

    /// Most recent sample.
    pub fn recent(&self) -> Option<i16> {
        self.ring.recent().copied()
    }

    /// All retained samples, oldest first.
    pub fn oldest_first(&self) -> OldestOrdered<'_, i16> {
        self.ring.oldest_ordered()
    }

    /// The newest `count` samples (or fewer while warming up), oldest first.
    pub fn latest(&self, count: usize) -> impl Iterator<Item = i16> + '_ {
        let len = self.ring.len();
        self.ring
            .oldest_ordered()
            .skip(len - count.min(len))
            .copied()
    }

    /// Drops every sample and rewinds the cursor.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.cursor = 0;
    }
}

impl<const C: usize> Default for SampleHistory<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// One physical wire together with its sample history.
#[derive(Clone)]
pub struct Conductor<const C: usize> {
    line: ConductorLine,
    history: SampleHistory<C>,
}

impl<const C: usize> Conductor<C> {
    /// Creates a conductor with an empty history.
    pub const fn new(id: ConductorId) -> Self {
        Self {
            line: conductor_by_id(id),
            history: SampleHistory::new(),
        }
    }

    /// Routing metadata for this conductor.
    pub const fn line(&self) -> ConductorLine {
        self.line
    }

    /// Read-only view of the history.
    pub const fn history(&self) -> &SampleHistory<C> {
        &self.history
    }

    /// Converts a raw code and appends the result to the history.
    pub fn record(&mut self, raw: u16, network: &ScalingNetwork) -> i16 {
        let volts = network.volts(raw);
        self.history.push(volts);
        volts
    }
}

/// Time-aligned tip and ring voltages from one acquisition cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SamplePair {
    pub tip: i16,
    pub ring: i16,
}

impl SamplePair {
    pub const fn new(tip: i16, ring: i16) -> Self {
        Self { tip, ring }
    }

    /// Voltage across the pair (tip minus ring).
    pub const fn delta(self) -> i32 {
        self.tip as i32 - self.ring as i32
    }
}

/// Both conductors of the line, advanced in lock step.
#[derive(Clone)]
pub struct LinePair<const C: usize> {
    tip: Conductor<C>,
    ring: Conductor<C>,
}

impl<const C: usize> LinePair<C> {
    /// Creates the pair with empty histories.
    pub const fn new() -> Self {
        Self {
            tip: Conductor::new(ConductorId::Tip),
            ring: Conductor::new(ConductorId::Ring),
        }
    }

    /// Records one reading per conductor. Both histories advance together.
    pub fn record(&mut self, tip_raw: u16, ring_raw: u16, network: &ScalingNetwork) -> SamplePair {
        let tip = self.tip.record(tip_raw, network);
        let ring = self.ring.record(ring_raw, network);
        SamplePair::new(tip, ring)
    }

    /// Records an already converted pair.
    pub fn record_volts(&mut self, pair: SamplePair) {
        self.tip.history.push(pair.tip);
        self.ring.history.push(pair.ring);
    }

    /// Returns the conductor for `id`.
    pub const fn conductor(&self, id: ConductorId) -> &Conductor<C> {
        match id {
            ConductorId::Tip => &self.tip,
            ConductorId::Ring => &self.ring,
        }
    }

    /// Number of aligned pairs held.
    pub fn len(&self) -> usize {
        self.tip.history.len()
    }

    /// Returns `true` when nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.tip.history.is_empty()
    }

    /// Returns `true` once both histories are full.
    pub fn is_warm(&self) -> bool {
        self.tip.history.is_warm() && self.ring.history.is_warm()
    }

    /// Most recent aligned pair.
    pub fn recent(&self) -> Option<SamplePair> {
        match (self.tip.history.recent(), self.ring.history.recent()) {
            (Some(tip), Some(ring)) => Some(SamplePair::new(tip, ring)),
            _ => None,
        }
    }

    /// The newest `count` aligned pairs, oldest first.
    pub fn latest_pairs(&self, count: usize) -> impl Iterator<Item = SamplePair> + '_ {
        self.tip
            .history
            .latest(count)
            .zip(self.ring.history.latest(count))
            .map(|(tip, ring)| SamplePair::new(tip, ring))
    }

    /// Drops both histories.
    pub fn clear(&mut self) {
        self.tip.history.clear();
        self.ring.history.clear();
    }
}

impl<const C: usize> Default for LinePair<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::DEFAULT_SCALING_NETWORK;

    #[test]
    fn conductor_lookup_returns_expected_metadata() {
        let ring = conductor_by_id(ConductorId::Ring);
        assert_eq!(ring.name, "RING");
        assert_eq!(ring.mcu_pin, "PA1");
        assert_eq!(ring.adc_channel, 1);
        assert_eq!(ConductorId::from_index(0), Some(ConductorId::Tip));
        assert_eq!(ConductorId::from_index(2), None);
    }

    #[test]
    fn cursor_wraps_and_tracks_oldest_slot() {
        let mut history = SampleHistory::<4>::new();
        assert_eq!(history.cursor(), 0);
        for volts in 1..=3 {
            history.push(volts);
        }
        assert_eq!(history.cursor(), 3);
        assert!(!history.is_warm());

        history.push(4);
        assert_eq!(history.cursor(), 0);
        assert!(history.is_warm());

        history.push(5);
        assert_eq!(history.cursor(), 1);
        assert_eq!(history.len(), 4);
        let mut ordered = history.oldest_first();
        assert_eq!(ordered.next(), Some(&2));
    }

    #[test]
    fn warm_history_keeps_exactly_capacity_in_order() {
        let mut history = SampleHistory::<5>::new();
        for volts in 0..12 {
            history.push(volts);
        }
        assert_eq!(history.len(), history.capacity());

        let mut expected = 7;
        for sample in history.oldest_first() {
            assert_eq!(*sample, expected);
            expected += 1;
        }
        assert_eq!(expected, 12);
    }

    #[test]
    fn latest_returns_newest_samples_oldest_first() {
        let mut history = SampleHistory::<8>::new();
        for volts in [10, 20, 30, 40, 50] {
            history.push(volts);
        }

        let mut latest = history.latest(3);
        assert_eq!(latest.next(), Some(30));
        assert_eq!(latest.next(), Some(40));
        assert_eq!(latest.next(), Some(50));
        assert_eq!(latest.next(), None);

        assert_eq!(history.latest(99).count(), 5);
        assert_eq!(history.recent(), Some(50));
    }

    #[test]
    fn pair_histories_stay_index_aligned() {
        let mut pair = LinePair::<6>::new();
        for step in 0..9_i16 {
            pair.record_volts(SamplePair::new(step, -step));
        }

        assert!(pair.is_warm());
        assert_eq!(pair.len(), 6);
        assert_eq!(
            pair.conductor(ConductorId::Tip).history().cursor(),
            pair.conductor(ConductorId::Ring).history().cursor()
        );
        for sample in pair.latest_pairs(6) {
            assert_eq!(sample.tip, -sample.ring);
        }
        assert_eq!(pair.recent(), Some(SamplePair::new(8, -8)));
    }

    #[test]
    fn record_converts_through_network() {
        let network = DEFAULT_SCALING_NETWORK;
        let mut pair = LinePair::<4>::new();
        let sample = pair.record(0, network.full_scale, &network);
        assert_eq!(sample.tip, network.min_volts());
        assert_eq!(sample.ring, network.max_volts());
        assert_eq!(sample.delta(), -663);
    }
}

//! Monitor configuration.
//!
//! Everything that tunes the monitor to one physical line lives here:
//! the scaling network calibration, the classifier thresholds, the
//! conditioning strategy and its dwell, the sample interval and how the dwell
//! is spent. Defaults are `const` so firmware can build its configuration at
//! compile time.

use core::{fmt, time::Duration};

use crate::acquisition::{DEFAULT_SCALING_NETWORK, ScalingNetwork};
use crate::classifier::{ClassifierConfig, DEFAULT_CLASSIFIER};
use crate::conditioning::{ConditioningStrategy, ConditioningTemplate};
use crate::sequencer::ActuationMode;

/// Samples retained per conductor.
pub const HISTORY_CAPACITY: usize = 20;

/// Pause between the end of one cycle and the start of the next.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(5);

/// Complete monitor configuration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MonitorConfig {
    pub scaling: ScalingNetwork,
    pub classifier: ClassifierConfig,
    pub strategy: ConditioningStrategy,
    /// Overrides the strategy's default dwell.
    pub dwell: Option<Duration>,
    pub sample_interval: Duration,
    pub actuation: ActuationMode,
}

impl MonitorConfig {
    /// Board defaults: shunt strategy, blocking dwell.
    pub const DEFAULT: Self = Self {
        scaling: DEFAULT_SCALING_NETWORK,
        classifier: DEFAULT_CLASSIFIER,
        strategy: ConditioningStrategy::ShuntIsolate,
        dwell: None,
        sample_interval: SAMPLE_INTERVAL,
        actuation: ActuationMode::Blocking,
    };

    #[must_use]
    pub const fn with_scaling(mut self, scaling: ScalingNetwork) -> Self {
        self.scaling = scaling;
        self
    }

    #[must_use]
    pub const fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub const fn with_strategy(mut self, strategy: ConditioningStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub const fn with_dwell(mut self, dwell: Duration) -> Self {
        self.dwell = Some(dwell);
        self
    }

    #[must_use]
    pub const fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_actuation(mut self, mode: ActuationMode) -> Self {
        self.actuation = mode;
        self
    }

    /// Template for the selected strategy.
    pub const fn template(&self) -> ConditioningTemplate {
        self.strategy.template()
    }

    /// Effective dwell: the override when present, else the template default.
    pub const fn dwell(&self) -> Duration {
        match self.dwell {
            Some(dwell) => dwell,
            None => self.strategy.template().dwell,
        }
    }

    /// Checks the configuration against a history of `capacity` samples.
    pub fn validate(&self, capacity: usize) -> Result<(), ConfigError> {
        if self.scaling.full_scale == 0 {
            return Err(ConfigError::ZeroFullScale);
        }
        if !self.scaling.is_valid() {
            return Err(ConfigError::InvalidResistor);
        }
        if self.classifier.window == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if self.classifier.window > capacity {
            return Err(ConfigError::WindowTooLarge {
                window: self.classifier.window,
                capacity,
            });
        }
        if !self.classifier.on_hook.is_valid() || !self.classifier.off_hook.is_valid() {
            return Err(ConfigError::InvalidBand);
        }
        if self.classifier.ringing_magnitude < 0 {
            return Err(ConfigError::NegativeRingingMagnitude);
        }
        if self.classifier.ringing_min_count == 0
            || self.classifier.ringing_min_count > self.classifier.window
        {
            return Err(ConfigError::RingingCountOutOfRange {
                count: self.classifier.ringing_min_count,
                window: self.classifier.window,
            });
        }
        if self.sample_interval.is_zero() {
            return Err(ConfigError::ZeroSampleInterval);
        }
        let window = self.template().dwell_window;
        let dwell = self.dwell();
        if !window.allows(dwell) {
            return Err(ConfigError::DwellOutOfRange {
                dwell,
                min: window.min,
                max: window.max,
            });
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Reasons a [`MonitorConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The classifier window is longer than the sample history.
    WindowTooLarge { window: usize, capacity: usize },
    EmptyWindow,
    /// A voltage band has `min > max`.
    InvalidBand,
    NegativeRingingMagnitude,
    /// The ringing count is zero or larger than the window. A zero count would
    /// turn every unmatched window into ringing.
    RingingCountOutOfRange { count: usize, window: usize },
    DwellOutOfRange {
        dwell: Duration,
        min: Duration,
        max: Duration,
    },
    ZeroFullScale,
    ZeroSampleInterval,
    /// A scaling resistor or the reference voltage is not positive.
    InvalidResistor,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::WindowTooLarge { window, capacity } => write!(
                f,
                "classifier window of {window} samples exceeds history capacity {capacity}"
            ),
            ConfigError::EmptyWindow => f.write_str("classifier window is empty"),
            ConfigError::InvalidBand => f.write_str("voltage band minimum exceeds its maximum"),
            ConfigError::NegativeRingingMagnitude => {
                f.write_str("ringing magnitude must not be negative")
            }
            ConfigError::RingingCountOutOfRange { count, window } => write!(
                f,
                "ringing count {count} must lie within 1..={window}"
            ),
            ConfigError::DwellOutOfRange { dwell, min, max } => write!(
                f,
                "dwell {} ms outside {}..={} ms",
                dwell.as_millis(),
                min.as_millis(),
                max.as_millis()
            ),
            ConfigError::ZeroFullScale => f.write_str("ADC full scale is zero"),
            ConfigError::ZeroSampleInterval => f.write_str("sample interval is zero"),
            ConfigError::InvalidResistor => {
                f.write_str("scaling network values must be positive")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::VoltageBand;

    #[test]
    fn defaults_validate() {
        assert_eq!(MonitorConfig::DEFAULT.validate(HISTORY_CAPACITY), Ok(()));
        assert_eq!(MonitorConfig::DEFAULT.dwell(), Duration::from_millis(600));
    }

    #[test]
    fn strategy_supplies_default_dwell() {
        let config = MonitorConfig::DEFAULT.with_strategy(ConditioningStrategy::ParallelCapacitor);
        assert_eq!(config.dwell(), Duration::from_millis(750));
        let config = config.with_dwell(Duration::from_millis(900));
        assert_eq!(config.dwell(), Duration::from_millis(900));
        assert_eq!(config.validate(HISTORY_CAPACITY), Ok(()));
    }

    #[test]
    fn dwell_outside_strategy_window_is_rejected() {
        let config = MonitorConfig::DEFAULT.with_dwell(Duration::from_millis(1_200));
        assert_eq!(
            config.validate(HISTORY_CAPACITY),
            Err(ConfigError::DwellOutOfRange {
                dwell: Duration::from_millis(1_200),
                min: Duration::from_millis(300),
                max: Duration::from_millis(1_000),
            })
        );
    }

    #[test]
    fn window_must_fit_history() {
        let classifier = ClassifierConfig {
            window: HISTORY_CAPACITY + 1,
            ..DEFAULT_CLASSIFIER
        };
        let config = MonitorConfig::DEFAULT.with_classifier(classifier);
        assert_eq!(
            config.validate(HISTORY_CAPACITY),
            Err(ConfigError::WindowTooLarge {
                window: HISTORY_CAPACITY + 1,
                capacity: HISTORY_CAPACITY,
            })
        );

        let empty = MonitorConfig::DEFAULT.with_classifier(ClassifierConfig {
            window: 0,
            ..DEFAULT_CLASSIFIER
        });
        assert_eq!(empty.validate(HISTORY_CAPACITY), Err(ConfigError::EmptyWindow));
    }

    #[test]
    fn inverted_band_and_zero_values_are_rejected() {
        let inverted = MonitorConfig::DEFAULT.with_classifier(ClassifierConfig {
            on_hook: VoltageBand::new(60, 35),
            ..DEFAULT_CLASSIFIER
        });
        assert_eq!(inverted.validate(HISTORY_CAPACITY), Err(ConfigError::InvalidBand));

        let interval = MonitorConfig::DEFAULT.with_sample_interval(Duration::ZERO);
        assert_eq!(
            interval.validate(HISTORY_CAPACITY),
            Err(ConfigError::ZeroSampleInterval)
        );

        let mut scaling = DEFAULT_SCALING_NETWORK;
        scaling.full_scale = 0;
        assert_eq!(
            MonitorConfig::DEFAULT
                .with_scaling(scaling)
                .validate(HISTORY_CAPACITY),
            Err(ConfigError::ZeroFullScale)
        );

        let mut scaling = DEFAULT_SCALING_NETWORK;
        scaling.rb_ohms = 0.0;
        assert_eq!(
            MonitorConfig::DEFAULT
                .with_scaling(scaling)
                .validate(HISTORY_CAPACITY),
            Err(ConfigError::InvalidResistor)
        );
    }

    #[test]
    fn ringing_count_must_fit_the_window() {
        let zero = MonitorConfig::DEFAULT.with_classifier(ClassifierConfig {
            ringing_min_count: 0,
            ..DEFAULT_CLASSIFIER
        });
        assert_eq!(
            zero.validate(HISTORY_CAPACITY),
            Err(ConfigError::RingingCountOutOfRange {
                count: 0,
                window: DEFAULT_CLASSIFIER.window,
            })
        );

        let oversized = MonitorConfig::DEFAULT.with_classifier(ClassifierConfig {
            ringing_min_count: DEFAULT_CLASSIFIER.window + 1,
            ..DEFAULT_CLASSIFIER
        });
        assert!(matches!(
            oversized.validate(HISTORY_CAPACITY),
            Err(ConfigError::RingingCountOutOfRange { .. })
        ));

        let whole_window = MonitorConfig::DEFAULT.with_classifier(ClassifierConfig {
            ringing_min_count: DEFAULT_CLASSIFIER.window,
            ..DEFAULT_CLASSIFIER
        });
        assert_eq!(whole_window.validate(HISTORY_CAPACITY), Ok(()));
    }

    #[test]
    fn negative_ringing_magnitude_is_rejected() {
        let config = MonitorConfig::DEFAULT.with_classifier(ClassifierConfig {
            ringing_magnitude: -1,
            ..DEFAULT_CLASSIFIER
        });
        assert_eq!(
            config.validate(HISTORY_CAPACITY),
            Err(ConfigError::NegativeRingingMagnitude)
        );
    }
}

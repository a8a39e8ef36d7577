//! Conversion from raw ADC codes to line voltages.
//!
//! Each conductor reaches the ADC through a resistive scale/bias network: a
//! large series resistor (RA) from the line, a pull towards a bias rail (RB),
//! and a pull to ground (RC). Solving the node equation for the line side gives
//! a fixed affine transform from ADC code to volts relative to ground. The
//! resistor values and rails are calibration data owned by
//! [`MonitorConfig`](crate::config::MonitorConfig).

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

/// ADC reference voltage.
pub const DEFAULT_VREF: f32 = 3.3;
/// Largest code produced by the 12-bit ADC.
pub const DEFAULT_FULL_SCALE: u16 = 4095;
/// Bias rail feeding RB.
pub const DEFAULT_VBIAS: f32 = 3.3;
/// Series resistor between the conductor and the ADC node.
pub const DEFAULT_RA_OHMS: f32 = 1_000_000.0;
/// Resistor between the ADC node and the bias rail.
pub const DEFAULT_RB_OHMS: f32 = 10_000.0;
/// Resistor between the ADC node and ground.
pub const DEFAULT_RC_OHMS: f32 = 10_000.0;

/// Calibration of the scale/bias network in front of one ADC channel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScalingNetwork {
    pub vref: f32,
    pub full_scale: u16,
    pub vbias: f32,
    pub ra_ohms: f32,
    pub rb_ohms: f32,
    pub rc_ohms: f32,
}

/// Network fitted on the current board revision (roughly -330 V to +333 V).
pub const DEFAULT_SCALING_NETWORK: ScalingNetwork = ScalingNetwork::new(
    DEFAULT_VREF,
    DEFAULT_FULL_SCALE,
    DEFAULT_VBIAS,
    DEFAULT_RA_OHMS,
    DEFAULT_RB_OHMS,
    DEFAULT_RC_OHMS,
);

impl ScalingNetwork {
    pub const fn new(
        vref: f32,
        full_scale: u16,
        vbias: f32,
        ra_ohms: f32,
        rb_ohms: f32,
        rc_ohms: f32,
    ) -> Self {
        Self {
            vref,
            full_scale,
            vbias,
            ra_ohms,
            rb_ohms,
            rc_ohms,
        }
    }

    fn node_conductance(&self) -> f32 {
        1.0 / self.ra_ohms + 1.0 / self.rb_ohms + 1.0 / self.rc_ohms
    }

    /// Voltage at the ADC pin for a raw code.
    pub fn adc_volts(&self, raw: u16) -> f32 {
        f32::from(raw) * self.vref / f32::from(self.full_scale)
    }

    /// Unrounded line voltage for a raw code.
    ///
    /// Codes above `full_scale` are extrapolated along the same line.
    pub fn line_volts(&self, raw: u16) -> f32 {
        let vout = self.adc_volts(raw);
        (vout * self.node_conductance() - self.vbias / self.rb_ohms) * self.ra_ohms
    }

    /// Line voltage for a raw code, rounded half away from zero.
    pub fn volts(&self, raw: u16) -> i16 {
        round_half_away(self.line_volts(raw))
    }

    /// Voltage reported for raw code 0.
    pub fn min_volts(&self) -> i16 {
        self.volts(0)
    }

    /// Voltage reported for the full-scale code.
    pub fn max_volts(&self) -> i16 {
        self.volts(self.full_scale)
    }

    /// Inverse transform: the ADC code a given line voltage would produce,
    /// clamped to the converter's range.
    pub fn raw_for_volts(&self, volts: f32) -> u16 {
        let vout = (volts / self.ra_ohms + self.vbias / self.rb_ohms) / self.node_conductance();
        let code = vout * f32::from(self.full_scale) / self.vref;
        if code <= 0.0 {
            0
        } else if code >= f32::from(self.full_scale) {
            self.full_scale
        } else {
            (code + 0.5) as u16
        }
    }

    /// Returns `true` when the network can be evaluated without dividing by zero.
    pub fn is_valid(&self) -> bool {
        self.full_scale > 0
            && self.vref > 0.0
            && self.ra_ohms > 0.0
            && self.rb_ohms > 0.0
            && self.rc_ohms > 0.0
    }
}

impl Default for ScalingNetwork {
    fn default() -> Self {
        DEFAULT_SCALING_NETWORK
    }
}

/// Rounds to the nearest integer, ties away from zero, saturating at the
/// `i16` range. `NaN` maps to zero.
pub fn round_half_away(value: f32) -> i16 {
    if value >= 0.0 {
        (value + 0.5) as i16
    } else {
        (value - 0.5) as i16
    }
}

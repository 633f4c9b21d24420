//! ADC calibration and the current-sense interlock policy.
//!
//! [`SenseConfig`] holds every calibration constant for a hardware revision and
//! provides the pure conversions. [`SenseMonitor`] wraps it with the rate-limited
//! diagnostics and the substitution policy for implausible phase currents.

use crate::CONFIGURED_CSA_GAIN;

/// Two-point linear map from battery divider counts to pack volts.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryCalibration {
    pub raw_low: u16,
    pub volts_low: f32,
    pub raw_high: u16,
    pub volts_high: f32,
}

impl BatteryCalibration {
    /// 140 kΩ / 10 kΩ divider: 18.0 V reads 1489 counts, 25.2 V reads 2084.
    pub const DEFAULT: Self = Self {
        raw_low: 1489,
        volts_low: 18.0,
        raw_high: 2084,
        volts_high: 25.2,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SenseConfig {
    /// ADC reference [V]
    pub adc_ref_volts: f32,
    /// ADC full-scale count (12-bit)
    pub adc_full_scale: u16,
    pub battery: BatteryCalibration,
    /// Phase shunt [Ω]
    pub r_sense_ohms: f32,
    /// CSA gain [V/V]; must match what the gate driver was configured with.
    pub csa_gain: f32,
    /// IPROPI current-mirror ratio [A/A]
    pub ipropi_ratio: f32,
    /// IPROPI sense resistor [Ω]
    pub ipropi_r_ohms: f32,
    /// Fraction of the ADC reference above which IPROPI is considered near saturation.
    pub ipropi_saturation_fraction: f32,
    /// Per-phase ceiling [A]. Above this a reading is treated as a sensing fault.
    pub max_phase_amps: f32,
    /// Minimum spacing of repeated diagnostics [ms]
    pub diagnostic_interval_ms: u32,
}

impl SenseConfig {
    pub const DEFAULT: Self = Self {
        adc_ref_volts: 3.3,
        adc_full_scale: 4095,
        battery: BatteryCalibration::DEFAULT,
        r_sense_ohms: 0.002,
        csa_gain: CONFIGURED_CSA_GAIN.volts_per_volt(),
        ipropi_ratio: 1100.0,
        ipropi_r_ohms: 1000.0,
        ipropi_saturation_fraction: 0.90,
        // Above normal operation, below the 35 A breaker.
        max_phase_amps: 30.0,
        diagnostic_interval_ms: 1000,
    };

    /// Counts to volts at the ADC pin.
    pub fn adc_volts(&self, raw: u16) -> f32 {
        if self.adc_full_scale == 0 {
            return 0.0;
        }
        (raw as f32 / self.adc_full_scale as f32) * self.adc_ref_volts
    }

    /// Battery voltage. `raw` is clamped to the calibration points, so the result
    /// never extrapolates past them.
    pub fn battery_volts(&self, raw: u16) -> f32 {
        let cal = &self.battery;
        if cal.raw_high <= cal.raw_low {
            return 0.0;
        }
        let raw = raw.clamp(cal.raw_low, cal.raw_high);
        let span_counts = (cal.raw_high - cal.raw_low) as f32;
        let span_volts = cal.volts_high - cal.volts_low;
        cal.volts_low + ((raw - cal.raw_low) as f32 * span_volts) / span_counts
    }

    /// State of charge, 0..=100, linear over the calibrated voltage range.
    pub fn battery_percent(&self, volts: f32) -> f32 {
        let cal = &self.battery;
        let span = cal.volts_high - cal.volts_low;
        if span <= 0.0 {
            return 0.0;
        }
        let clamped = volts.clamp(cal.volts_low, cal.volts_high);
        (clamped - cal.volts_low) * 100.0 / span
    }

    pub fn ladder_volts(&self, raw: u16) -> f32 {
        self.adc_volts(raw)
    }

    pub fn ipropi_amps(&self, raw: u16) -> f32 {
        if self.ipropi_r_ohms <= 0.0 {
            return 0.0;
        }
        self.adc_volts(raw) * (self.ipropi_ratio / self.ipropi_r_ohms)
    }

    /// True when the IPROPI voltage sits above the saturation fraction of the reference.
    pub fn ipropi_near_saturation(&self, raw: u16) -> bool {
        self.adc_volts(raw) > self.ipropi_saturation_fraction * self.adc_ref_volts
    }

    /// Phase current from a CSA output sample: `v_out / (r_sense * gain)`.
    pub fn csa_phase_amps(&self, raw: u16) -> f32 {
        let denom = self.r_sense_ohms * self.csa_gain;
        if denom <= 0.0 {
            return 0.0;
        }
        self.adc_volts(raw) / denom
    }

    /// Aggregate three phase currents, rejecting the set if any magnitude exceeds
    /// [`max_phase_amps`](Self::max_phase_amps).
    pub fn phase_current(&self, u: f32, v: f32, w: f32) -> MotorCurrent {
        let (u, v, w) = (libm::fabsf(u), libm::fabsf(v), libm::fabsf(w));
        let ceiling = self.max_phase_amps;
        if u > ceiling || v > ceiling || w > ceiling {
            return MotorCurrent::SensorFault { u, v, w };
        }
        MotorCurrent::Measured((u + v + w) / 3.0)
    }

    pub fn motor_current(&self, raw_u: u16, raw_v: u16, raw_w: u16) -> MotorCurrent {
        self.phase_current(
            self.csa_phase_amps(raw_u),
            self.csa_phase_amps(raw_v),
            self.csa_phase_amps(raw_w),
        )
    }
}

impl Default for SenseConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Outcome of aggregating the three CSA channels.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorCurrent {
    /// Mean of the phase magnitudes [A].
    Measured(f32),
    /// At least one phase exceeded the physical ceiling; per-phase magnitudes kept for diagnostics.
    SensorFault { u: f32, v: f32, w: f32 },
}

impl MotorCurrent {
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::SensorFault { .. })
    }

    /// Value handed to the interlock: the mean, or 0 for a rejected set.
    pub fn amps(&self) -> f32 {
        match *self {
            Self::Measured(amps) => amps,
            Self::SensorFault { .. } => 0.0,
        }
    }
}

/// Lets a diagnostic through at most once per interval.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    interval_ms: u32,
    last_ms: Option<u32>,
}

impl RateLimiter {
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_ms: None,
        }
    }

    /// Returns true and arms the limiter if more than the interval has passed since
    /// the last accepted call. Timestamps may wrap.
    pub fn ready(&mut self, now_ms: u32) -> bool {
        match self.last_ms {
            Some(last) if now_ms.wrapping_sub(last) <= self.interval_ms => false,
            _ => {
                self.last_ms = Some(now_ms);
                true
            }
        }
    }
}

/// Calibration with the rate-limited diagnostics attached.
pub struct SenseMonitor<'a> {
    config: &'a SenseConfig,
    ipropi_warning: RateLimiter,
    csa_fault: RateLimiter,
    csa_fault_count: u32,
    ipropi_warnings_emitted: u32,
    csa_fault_reports_emitted: u32,
}

impl<'a> SenseMonitor<'a> {
    pub fn new(config: &'a SenseConfig) -> Self {
        Self {
            config,
            ipropi_warning: RateLimiter::new(config.diagnostic_interval_ms),
            csa_fault: RateLimiter::new(config.diagnostic_interval_ms),
            csa_fault_count: 0,
            ipropi_warnings_emitted: 0,
            csa_fault_reports_emitted: 0,
        }
    }

    pub fn config(&self) -> &SenseConfig {
        self.config
    }

    /// Actuator current. Warns, at most once per interval, when the ADC nears saturation.
    pub fn ipropi_amps(&mut self, now_ms: u32, raw: u16) -> f32 {
        if self.config.ipropi_near_saturation(raw) && self.ipropi_warning.ready(now_ms) {
            self.ipropi_warnings_emitted = self.ipropi_warnings_emitted.saturating_add(1);
            warn!(
                "IPROPI ADC near saturation: {}V / {}V (check for actuator overcurrent or wrong ILIM resistor)",
                self.config.adc_volts(raw),
                self.config.adc_ref_volts
            );
        }
        self.config.ipropi_amps(raw)
    }

    /// Aggregate motor current for the interlock.
    ///
    /// A set with any phase above the ceiling is a sensing fault: 0 is returned instead
    /// of the mean and an error is logged at most once per interval.
    pub fn motor_current_amps(&mut self, now_ms: u32, raw_u: u16, raw_v: u16, raw_w: u16) -> f32 {
        let reading = self.config.motor_current(raw_u, raw_v, raw_w);
        if let MotorCurrent::SensorFault { u, v, w } = reading {
            self.csa_fault_count = self.csa_fault_count.saturating_add(1);
            if self.csa_fault.ready(now_ms) {
                self.csa_fault_reports_emitted = self.csa_fault_reports_emitted.saturating_add(1);
                error!(
                    "Motor CSA reading out of range (hardware fault): U={}A, V={}A, W={}A",
                    u,
                    v,
                    w
                );
                error!("DRV8353 CSA may be saturated, faulted, or configured with the wrong gain");
            }
        }
        reading.amps()
    }

    /// Number of rejected phase-current sets since construction.
    pub fn csa_fault_count(&self) -> u32 {
        self.csa_fault_count
    }

    /// IPROPI saturation warnings actually emitted (after rate limiting).
    pub fn ipropi_warnings_emitted(&self) -> u32 {
        self.ipropi_warnings_emitted
    }

    /// CSA out-of-range reports actually emitted (after rate limiting).
    pub fn csa_fault_reports_emitted(&self) -> u32 {
        self.csa_fault_reports_emitted
    }
}

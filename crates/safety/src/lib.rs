//! Safety supervisor and containment/release model.
//!
//! The supervisor is a five-state machine that escalates monotonically:
//! Normal -> Warning -> ScramInProgress -> EmergencyCooling -> Breach.
//! The only recovery edge is Warning -> Normal; Breach is terminal.
//! Equipment faults (rod jam) come from a seeded RNG owned here, so a fixed
//! seed reproduces a run exactly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sim::{require_range, ConfigError, ReactorState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyMode {
    Normal,
    Warning,
    ScramInProgress,
    EmergencyCooling,
    Breach,
}

impl SafetyMode {
    /// Escalation rank; used to assert monotone progression in tests.
    pub fn severity(self) -> u8 {
        match self {
            SafetyMode::Normal => 0,
            SafetyMode::Warning => 1,
            SafetyMode::ScramInProgress => 2,
            SafetyMode::EmergencyCooling => 3,
            SafetyMode::Breach => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SafetyConfig {
    pub elevated_temp_c: f64,
    pub critical_temp_c: f64,
    pub elevated_pressure_mpa: f64,
    pub critical_pressure_mpa: f64,
    /// Damage above this forces Breach and gates containment decay.
    pub damage_threshold: f64,
    /// Per-evaluation rod jam probability while a scram is running.
    pub fault_probability: f64,
    /// Rod travel per second during a scram.
    pub scram_rod_rate: f64,
    /// Flow ramp per second once emergency cooling takes the pumps.
    pub emergency_flow_rate: f64,
    /// Seconds emergency cooling gets to bring readings below critical.
    pub cooling_deadline_s: f64,
    /// Damage accrual gain while readings exceed the critical thresholds.
    pub k_damage: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            elevated_temp_c: 310.0,
            critical_temp_c: 350.0,
            elevated_pressure_mpa: 8.0,
            critical_pressure_mpa: 10.0,
            damage_threshold: 0.25,
            fault_probability: 0.002,
            scram_rod_rate: 0.25,
            emergency_flow_rate: 0.5,
            cooling_deadline_s: 30.0,
            k_damage: 0.05,
        }
    }
}

impl SafetyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_range("elevated_temp_c", self.elevated_temp_c, -273.15, 1e6)?;
        require_range("critical_temp_c", self.critical_temp_c, -273.15, 1e6)?;
        require_range("elevated_pressure_mpa", self.elevated_pressure_mpa, 0.0, 1e6)?;
        require_range("critical_pressure_mpa", self.critical_pressure_mpa, 0.0, 1e6)?;
        if self.critical_temp_c <= self.elevated_temp_c {
            return Err(ConfigError::Ordering {
                upper: "critical_temp_c",
                upper_value: self.critical_temp_c,
                lower: "elevated_temp_c",
                lower_value: self.elevated_temp_c,
            });
        }
        if self.critical_pressure_mpa <= self.elevated_pressure_mpa {
            return Err(ConfigError::Ordering {
                upper: "critical_pressure_mpa",
                upper_value: self.critical_pressure_mpa,
                lower: "elevated_pressure_mpa",
                lower_value: self.elevated_pressure_mpa,
            });
        }
        require_range("damage_threshold", self.damage_threshold, 0.0, 1.0)?;
        require_range("fault_probability", self.fault_probability, 0.0, 1.0)?;
        require_range("scram_rod_rate", self.scram_rod_rate, 0.0, f64::MAX)?;
        require_range("emergency_flow_rate", self.emergency_flow_rate, 0.0, f64::MAX)?;
        require_range("cooling_deadline_s", self.cooling_deadline_s, 0.0, f64::MAX)?;
        require_range("k_damage", self.k_damage, 0.0, f64::MAX)?;
        Ok(())
    }
}

/// The finite-state supervisor. Owns the fault RNG; after a scram begins it
/// is the sole writer of the rod position, and of the pump flow once
/// emergency cooling starts.
#[derive(Debug)]
pub struct SafetySystem {
    mode: SafetyMode,
    rod_jammed: bool,
    emergency_elapsed_s: f64,
    rng: StdRng,
}

impl SafetySystem {
    pub fn new(seed: u64) -> Self {
        Self {
            mode: SafetyMode::Normal,
            rod_jammed: false,
            emergency_elapsed_s: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn mode(&self) -> SafetyMode {
        self.mode
    }

    pub fn rod_jammed(&self) -> bool {
        self.rod_jammed
    }

    /// Back to Normal with a fresh RNG stream; used by controller reset.
    pub fn reset(&mut self, seed: u64) {
        self.mode = SafetyMode::Normal;
        self.rod_jammed = false;
        self.emergency_elapsed_s = 0.0;
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Evaluate the transition rules against the post-integration state and
    /// apply this tick's corrective action.
    pub fn evaluate(&mut self, cfg: &SafetyConfig, state: &mut ReactorState, dt_s: f64) {
        let over_critical = state.temperature >= cfg.critical_temp_c
            || state.pressure >= cfg.critical_pressure_mpa;
        let over_elevated = state.temperature >= cfg.elevated_temp_c
            || state.pressure >= cfg.elevated_pressure_mpa;

        // Damage accrues whenever readings exceed critical, in any mode,
        // proportional to how far past the threshold they sit.
        if over_critical && dt_s > 0.0 {
            let t_excess =
                ((state.temperature - cfg.critical_temp_c) / cfg.critical_temp_c).max(0.0);
            let p_excess = ((state.pressure - cfg.critical_pressure_mpa)
                / cfg.critical_pressure_mpa)
                .max(0.0);
            state.core_damage_fraction =
                (state.core_damage_fraction + cfg.k_damage * (t_excess + p_excess) * dt_s)
                    .clamp(0.0, 1.0);
        }

        match self.mode {
            SafetyMode::Normal | SafetyMode::Warning => {
                if over_critical {
                    log::warn!(
                        "scram: temp {:.1} C / pressure {:.2} MPa past critical",
                        state.temperature,
                        state.pressure
                    );
                    self.mode = SafetyMode::ScramInProgress;
                    self.drive_rods(cfg, state, dt_s);
                } else if over_elevated {
                    if self.mode == SafetyMode::Normal {
                        log::info!("elevated readings, entering Warning");
                    }
                    self.mode = SafetyMode::Warning;
                } else {
                    if self.mode == SafetyMode::Warning {
                        log::info!("readings recovered, back to Normal");
                    }
                    self.mode = SafetyMode::Normal;
                }
            }
            SafetyMode::ScramInProgress => {
                if cfg.fault_probability > 0.0 && self.rng.gen::<f64>() < cfg.fault_probability {
                    // Rod jam: insertion halts, fall back to emergency cooling.
                    log::warn!(
                        "rod insertion fault at position {:.2}, escalating to EmergencyCooling",
                        state.control_rod_position
                    );
                    self.rod_jammed = true;
                    self.emergency_elapsed_s = 0.0;
                    self.mode = SafetyMode::EmergencyCooling;
                    self.drive_pumps(cfg, state, dt_s, over_critical);
                } else {
                    self.drive_rods(cfg, state, dt_s);
                }
            }
            SafetyMode::EmergencyCooling => {
                self.drive_pumps(cfg, state, dt_s, over_critical);
            }
            // Terminal: no outgoing transitions, no more actuation.
            SafetyMode::Breach => {}
        }
    }

    fn drive_rods(&mut self, cfg: &SafetyConfig, state: &mut ReactorState, dt_s: f64) {
        if !self.rod_jammed && dt_s > 0.0 {
            state.control_rod_position =
                (state.control_rod_position + cfg.scram_rod_rate * dt_s).clamp(0.0, 1.0);
        }
    }

    fn drive_pumps(
        &mut self,
        cfg: &SafetyConfig,
        state: &mut ReactorState,
        dt_s: f64,
        over_critical: bool,
    ) {
        if dt_s > 0.0 {
            self.emergency_elapsed_s += dt_s;
            state.coolant_flow_rate =
                (state.coolant_flow_rate + cfg.emergency_flow_rate * dt_s).clamp(0.0, 1.0);
        }
        let out_of_time = over_critical && self.emergency_elapsed_s >= cfg.cooling_deadline_s;
        if out_of_time || state.core_damage_fraction >= cfg.damage_threshold {
            log::error!(
                "containment breach: damage {:.3}, emergency cooling ran {:.1}s",
                state.core_damage_fraction,
                self.emergency_elapsed_s
            );
            self.mode = SafetyMode::Breach;
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RadiationConfig {
    /// Integrity loss per second per unit of core damage while breached.
    pub breach_decay_rate: f64,
    /// Release per second per unit of (lost integrity x damage).
    pub release_rate_gain: f64,
    /// Integrity only starts decaying past this damage level.
    pub damage_threshold: f64,
}

impl Default for RadiationConfig {
    fn default() -> Self {
        Self {
            breach_decay_rate: 0.02,
            release_rate_gain: 50.0,
            damage_threshold: 0.25,
        }
    }
}

impl RadiationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_range("breach_decay_rate", self.breach_decay_rate, 0.0, f64::MAX)?;
        require_range("release_rate_gain", self.release_rate_gain, 0.0, f64::MAX)?;
        require_range("damage_threshold", self.damage_threshold, 0.0, 1.0)?;
        Ok(())
    }
}

/// Containment and release update, run after the safety evaluation.
///
/// Integrity decays only while the supervisor reports Breach and damage has
/// crossed the threshold; release accumulates from whatever integrity has
/// already been lost and never decreases.
pub fn update_radiation(
    cfg: &RadiationConfig,
    mode: SafetyMode,
    state: &mut ReactorState,
    dt_s: f64,
) {
    if !dt_s.is_finite() || dt_s <= 0.0 {
        return;
    }
    if mode == SafetyMode::Breach && state.core_damage_fraction >= cfg.damage_threshold {
        state.containment_integrity = (state.containment_integrity
            - cfg.breach_decay_rate * state.core_damage_fraction * dt_s)
            .clamp(0.0, 1.0);
    }
    let rate = cfg.release_rate_gain
        * (1.0 - state.containment_integrity)
        * state.core_damage_fraction;
    state.cumulative_release += rate.max(0.0) * dt_s;
}

//! Reactor core physics: state, parameters and the per-tick integrator.
//!
//! The model is a lumped (zero-dimensional) RBMK-style core with a positive
//! void coefficient. It is calibrated for a believable runaway demonstration,
//! not for engineering accuracy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised once at initialization when a supplied constant is unusable.
/// Numeric trouble during integration is clamped, never surfaced as an error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{upper} ({upper_value}) must be greater than {lower} ({lower_value})")]
    Ordering {
        upper: &'static str,
        upper_value: f64,
        lower: &'static str,
        lower_value: f64,
    },
}

pub fn require_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

pub fn require_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    require_finite(field, value)?;
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Physics constants and startup values for the lumped core model.
///
/// Units: power in MW(thermal), temperature in °C, pressure in MPa,
/// time in seconds. Fractional quantities are dimensionless 0..=1.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CoreParams {
    pub nominal_power_mw: f64,
    /// Structural limit; power is clamped here, it never diverges past it.
    pub max_power_mw: f64,
    pub startup_power_mw: f64,
    pub startup_rod_insertion: f64,
    pub startup_flow: f64,

    pub baseline_reactivity: f64,
    /// Positive void coefficient, the defining hazard of the design.
    pub k_void: f64,
    pub k_poison: f64,
    pub k_rod: f64,
    pub power_time_constant_s: f64,

    pub thermal_mass_mw_s_per_c: f64,
    pub ambient_c: f64,
    pub k_cool_mw_per_c: f64,
    /// Additive heat-loss floor so zero pump flow still cools a little
    /// (and no cooling term ever divides by the flow rate).
    pub k_passive_mw_per_c: f64,

    pub boiling_temp_c: f64,
    pub k_boil: f64,
    pub k_condense: f64,

    pub base_pressure_mpa: f64,
    pub k_pressure_temp: f64,
    pub k_pressure_steam: f64,

    pub iodine_yield: f64,
    pub iodine_decay: f64,
    pub xenon_decay: f64,
    pub xenon_burnup: f64,

    /// Integration steps larger than this are subdivided internally.
    pub max_substep_s: f64,
}

impl Default for CoreParams {
    fn default() -> Self {
        Self {
            nominal_power_mw: 3200.0,
            max_power_mw: 9600.0,
            startup_power_mw: 200.0,
            startup_rod_insertion: 0.7,
            startup_flow: 0.75,

            baseline_reactivity: 0.002,
            k_void: 0.12,
            k_poison: 0.02,
            k_rod: 0.2,
            power_time_constant_s: 2.0,

            thermal_mass_mw_s_per_c: 50.0,
            ambient_c: 25.0,
            k_cool_mw_per_c: 12.5,
            k_passive_mw_per_c: 0.05,

            boiling_temp_c: 285.0,
            k_boil: 0.4,
            k_condense: 0.8,

            base_pressure_mpa: 0.1,
            k_pressure_temp: 0.035,
            k_pressure_steam: 2.0,

            iodine_yield: 0.05,
            iodine_decay: 0.05,
            xenon_decay: 0.02,
            xenon_burnup: 0.06,

            max_substep_s: 0.05,
        }
    }
}

impl CoreParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_range("nominal_power_mw", self.nominal_power_mw, 1.0, f64::MAX)?;
        require_range(
            "max_power_mw",
            self.max_power_mw,
            self.nominal_power_mw,
            f64::MAX,
        )?;
        require_range(
            "startup_power_mw",
            self.startup_power_mw,
            0.0,
            self.max_power_mw,
        )?;
        require_range(
            "startup_rod_insertion",
            self.startup_rod_insertion,
            0.0,
            1.0,
        )?;
        require_range("startup_flow", self.startup_flow, 0.0, 1.0)?;
        require_finite("baseline_reactivity", self.baseline_reactivity)?;
        require_range("k_void", self.k_void, f64::MIN_POSITIVE, 10.0)?;
        require_range("k_poison", self.k_poison, 0.0, 10.0)?;
        require_range("k_rod", self.k_rod, f64::MIN_POSITIVE, 10.0)?;
        // A full insertion must always overcome maximum void worth.
        if self.k_rod <= self.baseline_reactivity + self.k_void {
            return Err(ConfigError::Ordering {
                upper: "k_rod",
                upper_value: self.k_rod,
                lower: "baseline_reactivity + k_void",
                lower_value: self.baseline_reactivity + self.k_void,
            });
        }
        require_range(
            "power_time_constant_s",
            self.power_time_constant_s,
            1e-3,
            1e6,
        )?;
        require_range(
            "thermal_mass_mw_s_per_c",
            self.thermal_mass_mw_s_per_c,
            1e-3,
            f64::MAX,
        )?;
        require_finite("ambient_c", self.ambient_c)?;
        require_range("k_cool_mw_per_c", self.k_cool_mw_per_c, 0.0, f64::MAX)?;
        require_range("k_passive_mw_per_c", self.k_passive_mw_per_c, 0.0, f64::MAX)?;
        require_finite("boiling_temp_c", self.boiling_temp_c)?;
        require_range("k_boil", self.k_boil, 0.0, f64::MAX)?;
        require_range("k_condense", self.k_condense, 0.0, f64::MAX)?;
        require_range("base_pressure_mpa", self.base_pressure_mpa, 0.0, f64::MAX)?;
        require_range("k_pressure_temp", self.k_pressure_temp, 0.0, f64::MAX)?;
        require_range("k_pressure_steam", self.k_pressure_steam, 0.0, f64::MAX)?;
        require_range("iodine_yield", self.iodine_yield, 0.0, f64::MAX)?;
        require_range("iodine_decay", self.iodine_decay, 0.0, f64::MAX)?;
        require_range("xenon_decay", self.xenon_decay, 0.0, f64::MAX)?;
        require_range("xenon_burnup", self.xenon_burnup, 0.0, f64::MAX)?;
        require_range("max_substep_s", self.max_substep_s, 1e-6, 10.0)?;
        Ok(())
    }
}

/// Complete physical state of the core. Mutated only by the integrator,
/// the safety system and the radiation model, in that per-tick order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReactorState {
    pub thermal_power: f64,
    pub temperature: f64,
    pub pressure: f64,
    /// Void fraction of the coolant volume, 0..=1.
    pub steam_fraction: f64,
    pub reactivity: f64,
    /// 0 = fully withdrawn, 1 = fully inserted.
    pub control_rod_position: f64,
    /// Fraction of nominal pump capacity, 0..=1.
    pub coolant_flow_rate: f64,
    pub xenon_concentration: f64,
    pub iodine_concentration: f64,
    /// 1 = intact, 0 = fully breached. Non-increasing.
    pub containment_integrity: f64,
    /// Non-decreasing.
    pub core_damage_fraction: f64,
    /// Non-decreasing.
    pub cumulative_release: f64,
}

/// Clamp on the net reactivity term; swings past this are not physical
/// in the lumped model and would destabilize the power law.
const REACTIVITY_LIMIT: f64 = 1.0;

/// Per-substep relative power change limit for the explicit Euler update.
const MAX_POWER_STEP: f64 = 0.5;

/// Upper bound on internal subdivision regardless of requested dt.
const MAX_SUBSTEPS: usize = 400;

impl ReactorState {
    /// Nominal startup condition: low power, rods mostly inserted,
    /// core at ambient temperature, no poison inventory.
    pub fn startup(p: &CoreParams) -> Self {
        Self {
            thermal_power: p.startup_power_mw,
            temperature: p.ambient_c,
            pressure: p.base_pressure_mpa,
            steam_fraction: 0.0,
            reactivity: 0.0,
            control_rod_position: p.startup_rod_insertion,
            coolant_flow_rate: p.startup_flow,
            xenon_concentration: 0.0,
            iodine_concentration: 0.0,
            containment_integrity: 1.0,
            core_damage_fraction: 0.0,
            cumulative_release: 0.0,
        }
    }

    /// Advance the physical state by `dt_s` simulated seconds.
    ///
    /// Steps above `max_substep_s` are subdivided so the explicit Euler
    /// update stays stable across the whole 0.1x..2.0x speed range.
    pub fn advance(&mut self, p: &CoreParams, dt_s: f64) {
        if !dt_s.is_finite() || dt_s <= 0.0 {
            return;
        }
        let n = ((dt_s / p.max_substep_s).ceil() as usize).clamp(1, MAX_SUBSTEPS);
        let sub = dt_s / n as f64;
        for _ in 0..n {
            self.substep(p, sub);
        }
    }

    fn substep(&mut self, p: &CoreParams, dt: f64) {
        // Net reactivity: positive void term against poison and rod worth.
        let rho = p.baseline_reactivity + p.k_void * self.steam_fraction
            - p.k_poison * self.xenon_concentration
            - p.k_rod * self.control_rod_position;
        self.reactivity = rho.clamp(-REACTIVITY_LIMIT, REACTIVITY_LIMIT);

        // First-order power law, dP/dt = P * rho / tau, capped at the
        // structural limit rather than allowed to diverge.
        let growth = (self.reactivity / p.power_time_constant_s * dt)
            .clamp(-MAX_POWER_STEP, MAX_POWER_STEP);
        self.thermal_power *= 1.0 + growth;

        // Heat balance. The passive term keeps cooling defined at zero flow.
        let over_ambient = (self.temperature - p.ambient_c).max(0.0);
        let cooling =
            (p.k_cool_mw_per_c * self.coolant_flow_rate + p.k_passive_mw_per_c) * over_ambient;
        self.temperature += (self.thermal_power - cooling) / p.thermal_mass_mw_s_per_c * dt;

        // Void: boiling above saturation, condensation scaled by pump flow.
        let boil = p.k_boil * (self.temperature - p.boiling_temp_c).max(0.0) / 100.0;
        let condense = p.k_condense * self.coolant_flow_rate * self.steam_fraction;
        self.steam_fraction += (boil - condense) * dt;

        // Monotone saturation-curve stand-in for the pressure.
        self.pressure = p.base_pressure_mpa
            + p.k_pressure_temp * (self.temperature - 100.0).max(0.0)
            + p.k_pressure_steam * self.steam_fraction.clamp(0.0, 1.0);

        // Xenon-135 chain: the iodine precursor lags power, xenon follows
        // iodine and is removed by decay plus neutron burnup.
        let pf = (self.thermal_power / p.nominal_power_mw).max(0.0);
        let d_iodine = p.iodine_yield * pf - p.iodine_decay * self.iodine_concentration;
        let d_xenon = p.iodine_decay * self.iodine_concentration
            - p.xenon_decay * self.xenon_concentration
            - p.xenon_burnup * pf * self.xenon_concentration;
        self.iodine_concentration += d_iodine * dt;
        self.xenon_concentration += d_xenon * dt;

        self.sanitize(p);
    }

    /// Re-clamp every field after a sub-step. Non-finite values are pulled
    /// back to a safe bound instead of propagating.
    fn sanitize(&mut self, p: &CoreParams) {
        if !self.thermal_power.is_finite() {
            self.thermal_power = p.max_power_mw;
        }
        self.thermal_power = self.thermal_power.clamp(0.0, p.max_power_mw);

        if !self.temperature.is_finite() {
            self.temperature = p.ambient_c;
        }

        if !self.pressure.is_finite() {
            self.pressure = p.base_pressure_mpa;
        }
        self.pressure = self.pressure.max(0.0);

        for f in [
            &mut self.steam_fraction,
            &mut self.control_rod_position,
            &mut self.coolant_flow_rate,
            &mut self.containment_integrity,
            &mut self.core_damage_fraction,
        ] {
            if !f.is_finite() {
                *f = 0.0;
            }
            *f = f.clamp(0.0, 1.0);
        }

        for c in [
            &mut self.xenon_concentration,
            &mut self.iodine_concentration,
            &mut self.cumulative_release,
        ] {
            if !c.is_finite() {
                *c = 0.0;
            }
            *c = c.max(0.0);
        }

        if !self.reactivity.is_finite() {
            self.reactivity = 0.0;
        }
        self.reactivity = self.reactivity.clamp(-REACTIVITY_LIMIT, REACTIVITY_LIMIT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_unit(v: f64) -> bool {
        (0.0..=1.0).contains(&v)
    }

    fn assert_bounded(s: &ReactorState, p: &CoreParams) {
        assert!(s.thermal_power.is_finite() && s.thermal_power >= 0.0);
        assert!(s.thermal_power <= p.max_power_mw);
        assert!(s.temperature.is_finite());
        assert!(s.pressure.is_finite() && s.pressure >= 0.0);
        assert!(in_unit(s.steam_fraction));
        assert!(in_unit(s.control_rod_position));
        assert!(in_unit(s.coolant_flow_rate));
        assert!(in_unit(s.containment_integrity));
        assert!(in_unit(s.core_damage_fraction));
        assert!(s.xenon_concentration >= 0.0);
        assert!(s.iodine_concentration >= 0.0);
        assert!(s.cumulative_release >= 0.0);
        assert!(s.reactivity.is_finite());
    }

    #[test]
    fn default_params_validate() {
        CoreParams::default().validate().unwrap();
    }

    #[test]
    fn rejects_weak_rod_worth() {
        let p = CoreParams {
            k_rod: 0.05,
            ..CoreParams::default()
        };
        assert!(matches!(p.validate(), Err(ConfigError::Ordering { .. })));
    }

    #[test]
    fn rejects_non_finite_coefficient() {
        let p = CoreParams {
            k_void: f64::NAN,
            ..CoreParams::default()
        };
        assert!(matches!(p.validate(), Err(ConfigError::NonFinite { .. })));
    }

    #[test]
    fn startup_state_is_bounded() {
        let p = CoreParams::default();
        assert_bounded(&ReactorState::startup(&p), &p);
    }

    #[test]
    fn zero_flow_never_divides_by_zero() {
        let p = CoreParams::default();
        let mut s = ReactorState::startup(&p);
        s.coolant_flow_rate = 0.0;
        for _ in 0..1000 {
            s.advance(&p, 0.1);
            assert_bounded(&s, &p);
        }
    }

    #[test]
    fn oversized_dt_is_subdivided_and_stays_bounded() {
        let p = CoreParams::default();
        let mut s = ReactorState::startup(&p);
        s.control_rod_position = 0.0;
        s.coolant_flow_rate = 0.0;
        s.temperature = 400.0;
        s.steam_fraction = 1.0;
        for _ in 0..50 {
            s.advance(&p, 10.0);
            assert_bounded(&s, &p);
        }
    }

    #[test]
    fn negative_or_zero_dt_is_a_no_op() {
        let p = CoreParams::default();
        let mut s = ReactorState::startup(&p);
        let before = s;
        s.advance(&p, 0.0);
        s.advance(&p, -1.0);
        s.advance(&p, f64::NAN);
        assert_eq!(s, before);
    }

    #[test]
    fn full_insertion_overcomes_full_void() {
        let p = CoreParams::default();
        let mut s = ReactorState::startup(&p);
        s.control_rod_position = 1.0;
        s.steam_fraction = 1.0;
        s.advance(&p, 0.1);
        assert!(s.reactivity < 0.0);
    }
}

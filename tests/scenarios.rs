use rbmk_excursion_sim::{
    Command, CoreParams, ReactorState, SafetyConfig, SafetyMode, SafetySystem, SimConfig,
    SimulationController,
};

/// Hot low-power operating point used as the starting state for the
/// accident scenarios: core at operating temperature, modest power.
fn hot_low_power(p: &CoreParams) -> ReactorState {
    let mut s = ReactorState::startup(p);
    s.temperature = 280.0;
    s.pressure = 6.5;
    s
}

#[test]
fn runaway_excursion_trips_scram() {
    let dt_s = 0.1;
    let p = CoreParams::default();
    let cfg = SafetyConfig {
        fault_probability: 0.0,
        ..SafetyConfig::default()
    };
    let mut sys = SafetySystem::new(1);

    let mut s = hot_low_power(&p);
    s.control_rod_position = 0.1;

    let steam_0 = s.steam_fraction;
    s.advance(&p, dt_s);
    sys.evaluate(&cfg, &mut s, dt_s);
    let reactivity_0 = s.reactivity;

    // Pumps tripped: hold flow at zero for 50 consecutive ticks.
    for _ in 0..50 {
        s.coolant_flow_rate = 0.0;
        s.advance(&p, dt_s);
        sys.evaluate(&cfg, &mut s, dt_s);
    }
    assert!(
        s.steam_fraction > steam_0,
        "void fraction should grow without cooling"
    );
    assert!(
        s.reactivity > reactivity_0,
        "positive void coefficient should push reactivity up"
    );

    // The excursion must eventually trip the scram.
    let mut scrammed = false;
    for _ in 0..5000 {
        s.coolant_flow_rate = 0.0;
        s.advance(&p, dt_s);
        sys.evaluate(&cfg, &mut s, dt_s);
        if sys.mode() == SafetyMode::ScramInProgress {
            scrammed = true;
            break;
        }
    }
    assert!(scrammed, "expected the excursion to reach ScramInProgress");
}

#[test]
fn small_excursion_recovers_through_warning() {
    let dt_s = 0.1;
    let p = CoreParams::default();
    let cfg = SafetyConfig::default();
    let mut sys = SafetySystem::new(2);

    // Elevated but sub-critical, with full pump flow and little power:
    // the core cools itself back down.
    let mut s = hot_low_power(&p);
    s.temperature = 320.0;
    s.thermal_power = 100.0;
    s.coolant_flow_rate = 1.0;

    let mut saw_warning = false;
    let mut recovered = false;
    for _ in 0..400 {
        s.advance(&p, dt_s);
        sys.evaluate(&cfg, &mut s, dt_s);
        assert_ne!(
            sys.mode(),
            SafetyMode::ScramInProgress,
            "sub-critical excursion must not scram"
        );
        match sys.mode() {
            SafetyMode::Warning => saw_warning = true,
            SafetyMode::Normal if saw_warning => {
                recovered = true;
                break;
            }
            _ => {}
        }
    }
    assert!(saw_warning, "expected a Warning while elevated");
    assert!(recovered, "expected recovery to Normal after cooling");
}

#[test]
fn xenon_peaks_after_power_drop() {
    let dt_s = 0.1;
    let p = CoreParams::default();
    let mut s = hot_low_power(&p);
    s.coolant_flow_rate = 1.0;

    // Sustained high power builds the iodine bank.
    for _ in 0..2000 {
        s.thermal_power = p.nominal_power_mw;
        s.advance(&p, dt_s);
    }
    let xenon_at_drop = s.xenon_concentration;
    assert!(xenon_at_drop > 0.0);

    // Drop to a trickle of power; xenon keeps climbing first.
    for _ in 0..50 {
        s.thermal_power = 100.0;
        s.advance(&p, dt_s);
    }
    assert!(
        s.xenon_concentration > xenon_at_drop,
        "xenon must keep rising right after the power drop"
    );

    let mut peak = s.xenon_concentration;
    for _ in 0..350 {
        s.thermal_power = 100.0;
        s.advance(&p, dt_s);
        peak = peak.max(s.xenon_concentration);
    }

    // Long after the drop the iodine bank is spent and xenon decays away.
    for _ in 0..1000 {
        s.thermal_power = 100.0;
        s.advance(&p, dt_s);
    }
    assert!(peak > xenon_at_drop);
    assert!(
        s.xenon_concentration < peak * 0.5,
        "xenon should decline once the iodine bank is spent"
    );
}

#[test]
fn stuck_rods_and_dead_pumps_end_in_breach() {
    let mut config = SimConfig {
        rng_seed: 99,
        ..SimConfig::default()
    };
    config.safety.fault_probability = 1.0;
    config.safety.emergency_flow_rate = 0.0;
    config.safety.cooling_deadline_s = 2.0;

    let mut ctl = SimulationController::new(config).unwrap();

    let mut breached_at = None;
    for i in 0..10_000 {
        ctl.push_command(Command::SetRodPosition(0.1));
        ctl.push_command(Command::SetCoolantFlow(0.0));
        let snap = ctl.tick(0.1);
        if snap.mode == SafetyMode::Breach {
            breached_at = Some(i);
            break;
        }
    }
    assert!(breached_at.is_some(), "expected a containment breach");

    // The simulation keeps running past the breach and keeps releasing.
    let mut previous = ctl.tick(0.1);
    for _ in 0..500 {
        let snap = ctl.tick(0.1);
        assert_eq!(snap.mode, SafetyMode::Breach, "Breach is terminal");
        assert!(snap.reactor.cumulative_release >= previous.reactor.cumulative_release);
        assert!(snap.reactor.containment_integrity <= previous.reactor.containment_integrity);
        previous = snap;
    }
    assert!(previous.reactor.containment_integrity < 1.0);
    assert!(previous.reactor.cumulative_release > 0.0);
}

use anyhow::Result;
use clap::{Parser, ValueEnum};
use controller::{Command, SimConfig, SimulationController};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use safety::SafetyMode;
use sim::ReactorState;

#[derive(Clone, Debug, ValueEnum)]
enum Scenario {
    /// Quiet startup, rods mostly inserted, pumps nominal.
    Nominal,
    /// Rods withdrawn and pumps tripped: positive void feedback excursion.
    Runaway,
    /// Runaway with a guaranteed rod jam during the scram.
    StuckRods,
    /// Excursion followed by a successful scram; run long (e.g. --seconds
    /// 600) to watch xenon keep climbing after the power collapse.
    IodinePit,
}

#[derive(Parser, Debug)]
#[command(
    name = "rbmk-sim",
    version,
    about = "Educational RBMK-style reactor excursion simulator"
)]
struct Args {
    #[arg(value_enum, long, default_value = "runaway")]
    scenario: Scenario,

    /// Total simulated run length in seconds
    #[arg(long, default_value_t = 300.0)]
    seconds: f64,

    /// Fixed wall-clock tick in milliseconds
    #[arg(long, default_value_t = 100)]
    dt_ms: u64,

    /// Speed multiplier (clamped to 0.1..=2.0)
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// RNG seed for deterministic fault injection
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Gaussian noise added to the reported temperature trace
    #[arg(long, default_value_t = 0.5)]
    noise_std: f64,
}

#[derive(serde::Serialize)]
struct TraceRow {
    t_s: f64,
    power_mw: f64,
    temp_c: f64,
    temp_meas_c: f64,
    pressure_mpa: f64,
    steam: f64,
    reactivity: f64,
    rod: f64,
    flow: f64,
    xenon: f64,
    iodine: f64,
    damage: f64,
    integrity: f64,
    release: f64,
    mode: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = SimConfig {
        rng_seed: args.seed,
        ..SimConfig::default()
    };
    if matches!(args.scenario, Scenario::StuckRods) {
        config.safety.fault_probability = 1.0;
    }

    let mut ctl = SimulationController::new(config)?;
    ctl.set_speed(args.speed);

    let wall_dt_s = (args.dt_ms as f64) / 1000.0;
    let steps = (args.seconds / (wall_dt_s * ctl.speed_multiplier())).ceil() as u64;

    // Display-side measurement noise only; the core state stays exact.
    let mut noise_rng = StdRng::seed_from_u64(args.seed ^ 0xD5);
    let noise = Normal::new(0.0, args.noise_std.max(0.0))?;

    // One JSON object per tick on stdout.
    let mut last_mode = SafetyMode::Normal;
    for _ in 0..steps {
        apply_scenario(&args.scenario, &mut ctl);
        let snap = ctl.tick(wall_dt_s);
        let r: ReactorState = snap.reactor;

        if snap.mode != last_mode {
            log::info!(
                "t={:.1}s mode {:?} -> {:?}",
                snap.simulated_time_s,
                last_mode,
                snap.mode
            );
            last_mode = snap.mode;
        }

        let row = TraceRow {
            t_s: snap.simulated_time_s,
            power_mw: r.thermal_power,
            temp_c: r.temperature,
            temp_meas_c: r.temperature + noise.sample(&mut noise_rng),
            pressure_mpa: r.pressure,
            steam: r.steam_fraction,
            reactivity: r.reactivity,
            rod: r.control_rod_position,
            flow: r.coolant_flow_rate,
            xenon: r.xenon_concentration,
            iodine: r.iodine_concentration,
            damage: r.core_damage_fraction,
            integrity: r.containment_integrity,
            release: r.cumulative_release,
            mode: format!("{:?}", snap.mode),
        };
        println!("{}", serde_json::to_string(&row)?);
    }

    Ok(())
}

/// Per-tick operator forcing for each demo arc. Commands the safety system
/// has taken ownership of are silently ignored by the controller.
fn apply_scenario(s: &Scenario, ctl: &mut SimulationController) {
    let t = ctl.simulated_time_s();
    match s {
        Scenario::Nominal => {}
        Scenario::Runaway | Scenario::StuckRods | Scenario::IodinePit => {
            // Withdraw the rods and trip the pumps once the run settles.
            if t > 5.0 {
                ctl.push_command(Command::SetRodPosition(0.1));
                ctl.push_command(Command::SetCoolantFlow(0.0));
            }
        }
    }
}

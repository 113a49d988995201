//! Simulation controller: owns the clock, the command queue and the
//! per-tick sequence (integrate -> safety -> radiation).
//!
//! The UI collaborators never touch reactor state directly. They enqueue
//! discrete commands and read the immutable snapshot published after a tick
//! completes, so a partially updated state is never observable.

use serde::{Deserialize, Serialize};
use sim::{ConfigError, CoreParams, ReactorState};
use std::collections::VecDeque;

use safety::{update_radiation, RadiationConfig, SafetyConfig, SafetyMode, SafetySystem};

pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 2.0;
pub const SPEED_STEP: f64 = 0.1;

/// Discrete control input forwarded from the input collaborator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    PauseToggle,
    SpeedIncrease,
    SpeedDecrease,
    /// Operator rod demand; honoured only before a scram owns the rods.
    SetRodPosition(f64),
    /// Operator pump demand; honoured until emergency cooling owns the flow.
    SetCoolantFlow(f64),
    Reset,
    ExitRequest,
}

/// Read-only view published once per tick for rendering and logging.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub reactor: ReactorState,
    pub mode: SafetyMode,
    pub simulated_time_s: f64,
    pub speed_multiplier: f64,
    pub paused: bool,
}

/// The full static configuration, validated once before the first tick.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SimConfig {
    pub core: CoreParams,
    pub safety: SafetyConfig,
    pub radiation: RadiationConfig,
    pub rng_seed: u64,
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.core.validate()?;
        self.safety.validate()?;
        self.radiation.validate()?;
        Ok(())
    }
}

pub struct SimulationController {
    config: SimConfig,
    state: ReactorState,
    safety: SafetySystem,
    commands: VecDeque<Command>,
    simulated_time_s: f64,
    speed_multiplier: f64,
    paused: bool,
    exit_requested: bool,
    snapshot: Snapshot,
}

impl SimulationController {
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = ReactorState::startup(&config.core);
        let safety = SafetySystem::new(config.rng_seed);
        let snapshot = Snapshot {
            reactor: state,
            mode: safety.mode(),
            simulated_time_s: 0.0,
            speed_multiplier: 1.0,
            paused: false,
        };
        Ok(Self {
            config,
            state,
            safety,
            commands: VecDeque::new(),
            simulated_time_s: 0.0,
            speed_multiplier: 1.0,
            paused: false,
            exit_requested: false,
            snapshot,
        })
    }

    pub fn push_command(&mut self, cmd: Command) {
        self.commands.push_back(cmd);
    }

    /// Advance one tick of `wall_delta_s` wall-clock seconds.
    ///
    /// Commands queued since the last tick are drained first. While paused
    /// no reactor state mutates and simulated time is unchanged; clock
    /// commands (pause, speed) still apply, and operator actuator demands
    /// stay queued until the first unpaused tick.
    pub fn tick(&mut self, wall_delta_s: f64) -> Snapshot {
        self.drain_commands();

        if !self.paused {
            let dt = if wall_delta_s.is_finite() {
                wall_delta_s.max(0.0) * self.speed_multiplier
            } else {
                0.0
            };
            if dt > 0.0 {
                self.state.advance(&self.config.core, dt);
                self.safety
                    .evaluate(&self.config.safety, &mut self.state, dt);
                update_radiation(
                    &self.config.radiation,
                    self.safety.mode(),
                    &mut self.state,
                    dt,
                );
                self.simulated_time_s += dt;
            }
        }

        self.snapshot = Snapshot {
            reactor: self.state,
            mode: self.safety.mode(),
            simulated_time_s: self.simulated_time_s,
            speed_multiplier: self.speed_multiplier,
            paused: self.paused,
        };
        self.snapshot
    }

    /// Last published snapshot; never exposes a half-finished tick.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
    }

    pub fn set_speed(&mut self, multiplier: f64) {
        let m = if multiplier.is_finite() { multiplier } else { 1.0 };
        self.speed_multiplier = m.clamp(MIN_SPEED, MAX_SPEED);
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.speed_multiplier
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn simulated_time_s(&self) -> f64 {
        self.simulated_time_s
    }

    /// Back to the startup state; the only way reactor state is ever reset.
    pub fn reset(&mut self) {
        log::info!("simulation reset");
        self.state = ReactorState::startup(&self.config.core);
        self.safety.reset(self.config.rng_seed);
        self.simulated_time_s = 0.0;
        self.snapshot = Snapshot {
            reactor: self.state,
            mode: self.safety.mode(),
            simulated_time_s: 0.0,
            speed_multiplier: self.speed_multiplier,
            paused: self.paused,
        };
    }

    fn drain_commands(&mut self) {
        // Actuator demands arriving while paused are held back so a paused
        // tick never touches reactor state; they land on the next unpaused
        // tick, in order.
        let mut deferred = VecDeque::new();
        while let Some(cmd) = self.commands.pop_front() {
            match cmd {
                Command::PauseToggle => self.paused = !self.paused,
                Command::SpeedIncrease => self.set_speed(self.speed_multiplier + SPEED_STEP),
                Command::SpeedDecrease => self.set_speed(self.speed_multiplier - SPEED_STEP),
                Command::SetRodPosition(pos) => {
                    if self.paused {
                        deferred.push_back(cmd);
                    } else if matches!(
                        self.safety.mode(),
                        SafetyMode::Normal | SafetyMode::Warning
                    ) && pos.is_finite()
                    {
                        // The scram sequence owns the rods from
                        // ScramInProgress on.
                        self.state.control_rod_position = pos.clamp(0.0, 1.0);
                    }
                }
                Command::SetCoolantFlow(flow) => {
                    if self.paused {
                        deferred.push_back(cmd);
                    } else if matches!(
                        self.safety.mode(),
                        SafetyMode::Normal | SafetyMode::Warning | SafetyMode::ScramInProgress
                    ) && flow.is_finite()
                    {
                        // Emergency cooling owns the pumps once it starts.
                        self.state.coolant_flow_rate = flow.clamp(0.0, 1.0);
                    }
                }
                Command::Reset => self.reset(),
                Command::ExitRequest => self.exit_requested = true,
            }
        }
        self.commands = deferred;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_tick_is_a_no_op_on_state() {
        let mut c = SimulationController::new(SimConfig::default()).unwrap();
        c.push_command(Command::PauseToggle);
        let before = c.tick(0.1);
        assert!(before.paused);
        for _ in 0..20 {
            let snap = c.tick(0.1);
            assert_eq!(snap.reactor, before.reactor);
            assert_eq!(snap.simulated_time_s, before.simulated_time_s);
        }
    }

    #[test]
    fn actuator_commands_wait_out_a_pause() {
        let mut c = SimulationController::new(SimConfig::default()).unwrap();
        c.push_command(Command::PauseToggle);
        let frozen = c.tick(0.1);
        assert!(frozen.paused);

        // Operator demands arriving while paused must not touch the core.
        c.push_command(Command::SetRodPosition(0.1));
        c.push_command(Command::SetCoolantFlow(0.0));
        for _ in 0..5 {
            let snap = c.tick(0.1);
            assert_eq!(snap.reactor, frozen.reactor);
        }

        // The resume toggle sits behind the held demands, so they apply on
        // the first tick that starts unpaused.
        c.push_command(Command::PauseToggle);
        let resumed = c.tick(0.0);
        assert!(!resumed.paused);
        assert_eq!(resumed.reactor, frozen.reactor);

        let next = c.tick(0.0);
        assert_eq!(next.reactor.control_rod_position, 0.1);
        assert_eq!(next.reactor.coolant_flow_rate, 0.0);
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let mut c = SimulationController::new(SimConfig::default()).unwrap();
        c.pause();
        c.pause();
        assert!(c.is_paused());
        c.resume();
        c.resume();
        assert!(!c.is_paused());
    }

    #[test]
    fn speed_is_clamped_at_both_ends() {
        let mut c = SimulationController::new(SimConfig::default()).unwrap();
        for _ in 0..30 {
            c.push_command(Command::SpeedIncrease);
        }
        c.tick(0.0);
        assert_eq!(c.speed_multiplier(), MAX_SPEED);

        for _ in 0..50 {
            c.push_command(Command::SpeedDecrease);
        }
        c.tick(0.0);
        assert_eq!(c.speed_multiplier(), MIN_SPEED);

        c.set_speed(999.0);
        assert_eq!(c.speed_multiplier(), MAX_SPEED);
        c.set_speed(f64::NAN);
        assert_eq!(c.speed_multiplier(), 1.0);
    }

    #[test]
    fn reset_restores_startup() {
        let mut c = SimulationController::new(SimConfig::default()).unwrap();
        c.push_command(Command::SetRodPosition(0.1));
        c.push_command(Command::SetCoolantFlow(0.0));
        for _ in 0..100 {
            c.tick(0.1);
        }
        assert_ne!(c.snapshot().reactor, ReactorState::startup(&SimConfig::default().core));

        c.push_command(Command::Reset);
        let snap = c.tick(0.0);
        assert_eq!(snap.simulated_time_s, 0.0);
        assert_eq!(snap.mode, SafetyMode::Normal);
        assert_eq!(snap.reactor, ReactorState::startup(&SimConfig::default().core));
    }

    #[test]
    fn exit_request_is_latched() {
        let mut c = SimulationController::new(SimConfig::default()).unwrap();
        assert!(!c.exit_requested());
        c.push_command(Command::ExitRequest);
        c.tick(0.1);
        assert!(c.exit_requested());
    }

    #[test]
    fn invalid_config_fails_before_first_tick() {
        let mut cfg = SimConfig::default();
        cfg.core.k_void = -1.0;
        assert!(SimulationController::new(cfg).is_err());
    }
}

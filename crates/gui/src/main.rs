use controller::{Command, SimConfig, SimulationController};
use eframe::egui;
use egui_plot::{Line, Plot, PlotPoints};
use safety::SafetyMode;
use serde::Deserialize;
use sim::ReactorState;
use std::fs;

#[derive(Clone, Debug)]
struct Sample {
    t: f64,
    temp: f64,
    pressure: f64,
    power: f64,
    reactivity: f64,
    steam: f64,
    xenon: f64,
    rod: f64,
    flow: f64,
    integrity: f64,
    release: f64,
    scrammed: bool,
    breached: bool,
}

/// One line of the CLI's JSONL trace.
#[derive(Debug, Deserialize)]
struct CliLine {
    t_s: f64,
    power_mw: f64,
    temp_c: f64,
    pressure_mpa: f64,
    steam: f64,
    reactivity: f64,
    rod: f64,
    flow: f64,
    xenon: f64,
    integrity: f64,
    release: f64,
    mode: String,
}

struct App {
    seed: u64,
    ctl: SimulationController,
    samples: Vec<Sample>,

    // Operator demands applied each frame until the safety system
    // takes the actuators away.
    rod_demand: f64,
    flow_demand: f64,
    forcing: bool,

    // Replay of a CLI trace
    replay_loaded: bool,
    replay_path: String,
    replay_all: Vec<Sample>,
    replay_pos: usize,
    replay_playing: bool,
    replay_speed: usize,
    last_error: Option<String>,
}

impl Default for App {
    fn default() -> Self {
        let seed = 12345;
        let config = SimConfig {
            rng_seed: seed,
            ..SimConfig::default()
        };
        let ctl = SimulationController::new(config).expect("default config is valid");
        Self {
            seed,
            ctl,
            samples: Vec::new(),
            rod_demand: 0.7,
            flow_demand: 0.75,
            forcing: false,
            replay_loaded: false,
            replay_path: "out/runaway.jsonl".to_string(),
            replay_all: Vec::new(),
            replay_pos: 0,
            replay_playing: false,
            replay_speed: 50,
            last_error: None,
        }
    }
}

impl App {
    fn reset(&mut self) {
        let config = SimConfig {
            rng_seed: self.seed,
            ..SimConfig::default()
        };
        self.ctl = SimulationController::new(config).expect("default config is valid");
        self.samples.clear();
        self.clear_replay();
    }

    fn clear_replay(&mut self) {
        self.replay_loaded = false;
        self.replay_all.clear();
        self.replay_pos = 0;
        self.replay_playing = false;
        self.last_error = None;
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        ctx.input(|i| {
            if i.key_pressed(egui::Key::Space) {
                self.ctl.push_command(Command::PauseToggle);
            }
            if i.key_pressed(egui::Key::ArrowUp) {
                self.ctl.push_command(Command::SpeedIncrease);
            }
            if i.key_pressed(egui::Key::ArrowDown) {
                self.ctl.push_command(Command::SpeedDecrease);
            }
            if i.key_pressed(egui::Key::R) {
                self.ctl.push_command(Command::Reset);
            }
            if i.key_pressed(egui::Key::Escape) {
                self.ctl.push_command(Command::ExitRequest);
            }
        });
    }

    fn step_live(&mut self, wall_dt_s: f64) {
        if self.forcing {
            self.ctl.push_command(Command::SetRodPosition(self.rod_demand));
            self.ctl.push_command(Command::SetCoolantFlow(self.flow_demand));
        }
        let snap = self.ctl.tick(wall_dt_s);
        if snap.paused {
            return;
        }
        let r: ReactorState = snap.reactor;
        self.samples.push(Sample {
            t: snap.simulated_time_s,
            temp: r.temperature,
            pressure: r.pressure,
            power: r.thermal_power,
            reactivity: r.reactivity,
            steam: r.steam_fraction,
            xenon: r.xenon_concentration,
            rod: r.control_rod_position,
            flow: r.coolant_flow_rate,
            integrity: r.containment_integrity,
            release: r.cumulative_release,
            scrammed: snap.mode.severity() >= SafetyMode::ScramInProgress.severity(),
            breached: snap.mode == SafetyMode::Breach,
        });
    }

    fn load_jsonl(&mut self, path: &str) {
        self.last_error = None;

        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                self.last_error = Some(format!("Failed to read {path}: {e}"));
                return;
            }
        };

        let mut loaded: Vec<Sample> = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let row: CliLine = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    self.last_error = Some(format!("JSON parse error at line {}: {}", i + 1, e));
                    return;
                }
            };
            loaded.push(Sample {
                t: row.t_s,
                temp: row.temp_c,
                pressure: row.pressure_mpa,
                power: row.power_mw,
                reactivity: row.reactivity,
                steam: row.steam,
                xenon: row.xenon,
                rod: row.rod,
                flow: row.flow,
                integrity: row.integrity,
                release: row.release,
                scrammed: matches!(
                    row.mode.as_str(),
                    "ScramInProgress" | "EmergencyCooling" | "Breach"
                ),
                breached: row.mode == "Breach",
            });
        }

        if loaded.is_empty() {
            self.last_error = Some(format!("No samples found in {path}"));
            return;
        }

        self.clear_replay();
        self.replay_loaded = true;
        self.replay_all = loaded;

        self.samples.clear();
        let initial = self.replay_speed.min(self.replay_all.len()).max(1);
        self.samples.extend_from_slice(&self.replay_all[..initial]);
        self.replay_pos = initial;
    }

    fn replay_tick(&mut self) {
        if !(self.replay_loaded && self.replay_playing) {
            return;
        }
        if self.replay_pos >= self.replay_all.len() {
            self.replay_playing = false;
            return;
        }
        let n = self.replay_speed.max(1);
        let end = (self.replay_pos + n).min(self.replay_all.len());
        self.samples
            .extend_from_slice(&self.replay_all[self.replay_pos..end]);
        self.replay_pos = end;
        if self.replay_pos >= self.replay_all.len() {
            self.replay_playing = false;
        }
    }

    fn scram_time_for_plot(&self) -> Option<f64> {
        if self.replay_loaded {
            self.replay_all.iter().find(|s| s.scrammed).map(|s| s.t)
        } else {
            self.samples.iter().find(|s| s.scrammed).map(|s| s.t)
        }
    }

    fn mode_label(mode: SafetyMode) -> (&'static str, egui::Color32) {
        match mode {
            SafetyMode::Normal => ("NORMAL", egui::Color32::GREEN),
            SafetyMode::Warning => ("WARNING", egui::Color32::YELLOW),
            SafetyMode::ScramInProgress => ("SCRAM", egui::Color32::ORANGE),
            SafetyMode::EmergencyCooling => ("EMERGENCY COOLING", egui::Color32::ORANGE),
            SafetyMode::Breach => ("BREACH", egui::Color32::RED),
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);
        self.replay_tick();

        if !self.replay_loaded {
            let wall_dt = ctx.input(|i| i.stable_dt) as f64;
            self.step_live(wall_dt.min(0.25));
        }
        if self.ctl.exit_requested() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
        ctx.request_repaint();

        let snap = self.ctl.snapshot();
        let (mode_txt, mode_color) = Self::mode_label(snap.mode);
        let scram_time = self.scram_time_for_plot();

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("RBMK Excursion Sim");
                ui.separator();
                ui.colored_label(mode_color, mode_txt);
                ui.separator();
                ui.label(format!(
                    "t={:.1}s  speed={:.1}x  {}",
                    snap.simulated_time_s,
                    snap.speed_multiplier,
                    if snap.paused { "PAUSED" } else { "RUNNING" }
                ));
                if let Some(t) = scram_time {
                    ui.separator();
                    ui.label(format!("t_scram = {:.2}s", t));
                }
            });
        });

        egui::SidePanel::left("left")
            .resizable(false)
            .show(ctx, |ui| {
                ui.label("Controls: Space pause, Up/Down speed, R reset, Esc quit");
                ui.separator();

                ui.add(egui::DragValue::new(&mut self.seed).prefix("seed: "));
                if ui.button("Reset").clicked() {
                    self.reset();
                }

                ui.separator();
                ui.label("Operator forcing");
                ui.checkbox(&mut self.forcing, "apply demands each frame");
                ui.add(
                    egui::Slider::new(&mut self.rod_demand, 0.0..=1.0).text("rod insertion"),
                );
                ui.add(egui::Slider::new(&mut self.flow_demand, 0.0..=1.0).text("pump flow"));
                ui.horizontal(|ui| {
                    if ui.button("Withdraw rods").clicked() {
                        self.rod_demand = 0.1;
                        self.forcing = true;
                    }
                    if ui.button("Trip pumps").clicked() {
                        self.flow_demand = 0.0;
                        self.forcing = true;
                    }
                });

                ui.separator();
                ui.label("Replay (JSONL)");
                ui.horizontal(|ui| {
                    ui.label("path:");
                    ui.text_edit_singleline(&mut self.replay_path);
                });
                ui.horizontal(|ui| {
                    if ui.button("Load").clicked() {
                        let p = self.replay_path.clone();
                        self.load_jsonl(&p);
                    }
                    if ui
                        .button(if self.replay_playing { "Pause" } else { "Play" })
                        .clicked()
                        && self.replay_loaded
                    {
                        self.replay_playing = !self.replay_playing;
                    }
                    if ui.button("Clear").clicked() {
                        self.clear_replay();
                        self.samples.clear();
                    }
                });
                ui.add(
                    egui::Slider::new(&mut self.replay_speed, 1..=500)
                        .text("replay samples/frame"),
                );

                if let Some(err) = &self.last_error {
                    ui.separator();
                    ui.colored_label(egui::Color32::RED, err);
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.samples.is_empty() {
                ui.label("No data yet.");
                return;
            }

            let temp: PlotPoints = self.samples.iter().map(|s| [s.t, s.temp]).collect();
            let pressure: PlotPoints =
                self.samples.iter().map(|s| [s.t, s.pressure * 50.0]).collect();
            let power: PlotPoints =
                self.samples.iter().map(|s| [s.t, s.power / 1000.0]).collect();
            let reactivity: PlotPoints =
                self.samples.iter().map(|s| [s.t, s.reactivity * 10.0]).collect();
            let steam: PlotPoints = self.samples.iter().map(|s| [s.t, s.steam]).collect();
            let xenon: PlotPoints = self.samples.iter().map(|s| [s.t, s.xenon]).collect();
            let rod: PlotPoints = self.samples.iter().map(|s| [s.t, s.rod]).collect();
            let flow: PlotPoints = self.samples.iter().map(|s| [s.t, s.flow]).collect();
            let integrity: PlotPoints =
                self.samples.iter().map(|s| [s.t, s.integrity]).collect();
            let release: PlotPoints =
                self.samples.iter().map(|s| [s.t, s.release / 100.0]).collect();

            ui.heading("Thermal");
            Plot::new("thermal_plot").height(160.0).show(ui, |plot_ui| {
                plot_ui.line(Line::new(temp).name("Temp (°C)"));
                plot_ui.line(Line::new(pressure).name("Pressure (x50 MPa)"));
                if let Some(t) = scram_time {
                    let vline: PlotPoints = vec![[t, 0.0], [t, 600.0]].into();
                    plot_ui.line(Line::new(vline).name("SCRAM"));
                }
            });

            ui.heading("Power and feedback");
            Plot::new("power_plot").height(160.0).show(ui, |plot_ui| {
                plot_ui.line(Line::new(power).name("Power (GW)"));
                plot_ui.line(Line::new(reactivity).name("Reactivity (x10)"));
                plot_ui.line(Line::new(steam).name("Void fraction"));
                plot_ui.line(Line::new(xenon).name("Xenon"));
            });

            ui.heading("Actuators and containment");
            Plot::new("contain_plot").height(160.0).show(ui, |plot_ui| {
                plot_ui.line(Line::new(rod).name("Rod insertion"));
                plot_ui.line(Line::new(flow).name("Pump flow"));
                plot_ui.line(Line::new(integrity).name("Containment"));
                plot_ui.line(Line::new(release).name("Release (x100)"));
            });

            ui.separator();
            let last = self.samples.last().unwrap();
            ui.label(format!(
                "t={:.1}s  temp={:.1}°C  power={:.0}MW  steam={:.2}  rod={:.2}  flow={:.2}  release={:.1}",
                last.t, last.temp, last.power, last.steam, last.rod, last.flow, last.release
            ));
            if last.breached {
                ui.colored_label(egui::Color32::RED, "CONTAINMENT BREACHED");
            }
        });
    }
}

fn main() -> eframe::Result<()> {
    env_logger::init();
    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "RBMK Excursion Sim",
        native_options,
        Box::new(|_cc| Ok(Box::new(App::default()))),
    )
}

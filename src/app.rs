//! Loki desktop window: egui/eframe application.
//!
//! The window is a thin view over shared state:
//!
//! * [`StatusModel`] is read every frame for the header label.
//! * [`Conversation`] is snapshotted every frame for the log.
//! * Buttons call straight into the [`ListenCycleCoordinator`] and the
//!   speech queue; neither call blocks.
//!
//! | Status | Header colour |
//! |--------|---------------|
//! | `Idle` | gray |
//! | `Listening` | red |
//! | `Thinking` | blue |
//! | `Speaking` | green |

use std::time::Duration;

use eframe::egui;

use crate::pipeline::{ListenCycleCoordinator, Message, Status};

// ---------------------------------------------------------------------------
// LokiApp
// ---------------------------------------------------------------------------

pub struct LokiApp {
    title: String,
    coordinator: ListenCycleCoordinator,
    /// Set once shutdown has run, so `on_exit` does not repeat it.
    closed: bool,
}

impl LokiApp {
    pub fn new(title: impl Into<String>, coordinator: ListenCycleCoordinator) -> Self {
        Self {
            title: title.into(),
            coordinator,
            closed: false,
        }
    }

    fn on_listen(&self) {
        if let Err(e) = self.coordinator.trigger() {
            log::debug!("ui: listen not started: {e}");
        }
    }

    fn on_stop_speaking(&self) {
        self.coordinator.speech().stop();
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            self.coordinator.speech().shutdown();
        }
    }

    fn draw_header(&self, ui: &mut egui::Ui, status: Status) {
        ui.horizontal(|ui| {
            ui.heading(egui::RichText::new(&self.title).size(28.0).strong());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(
                    egui::RichText::new(status.label())
                        .color(status_color(status))
                        .size(16.0),
                );
            });
        });
    }

    fn draw_history(&self, ui: &mut egui::Ui, entries: &[Message]) {
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for entry in entries {
                    ui.label(
                        egui::RichText::new(format!("{}:", entry.speaker))
                            .strong()
                            .color(speaker_color(&entry.speaker, &self.title)),
                    );
                    ui.label(&entry.text);
                    ui.add_space(8.0);
                }
            });
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, status: Status) {
        ui.horizontal(|ui| {
            let can_listen = status == Status::Idle;
            if ui
                .add_enabled(can_listen, egui::Button::new("Listen"))
                .clicked()
            {
                self.on_listen();
            }

            if ui.button("Stop Speaking").clicked() {
                self.on_stop_speaking();
            }

            if ui.button("Exit").clicked() {
                self.shutdown();
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });
    }
}

/// Accent colour for each status.
pub fn status_color(status: Status) -> egui::Color32 {
    match status {
        Status::Idle => egui::Color32::from_rgb(140, 140, 140),
        Status::Listening => egui::Color32::from_rgb(255, 68, 68),
        Status::Thinking => egui::Color32::from_rgb(68, 136, 255),
        Status::Speaking => egui::Color32::from_rgb(80, 200, 120),
    }
}

fn speaker_color(speaker: &str, assistant: &str) -> egui::Color32 {
    if speaker == assistant {
        egui::Color32::from_rgb(120, 180, 255)
    } else {
        egui::Color32::from_rgb(220, 220, 220)
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for LokiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let status = self.coordinator.status().get();
        let entries = self.coordinator.history().snapshot();

        // Background work changes state without input events.
        let interval = if status == Status::Idle { 250 } else { 100 };
        ctx.request_repaint_after(Duration::from_millis(interval));

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(6.0);
            self.draw_header(ui, status);
            ui.add_space(6.0);
        });

        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(6.0);
            self.draw_controls(ui, ctx, status);
            ui.add_space(6.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_history(ui, &entries);
        });
    }

    /// Window closed by any means: send the shutdown sentinel and join the
    /// speech worker.
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("ui: window closing");
        self.shutdown();
    }
}

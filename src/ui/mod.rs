use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use tracing::{error, info};

use crate::app::PipelineController;
use crate::domain::{AudioDevice, DomainError, PipelineState};

/// How often the GUI repaints while the pipeline runs, so entries appended
/// by the display worker become visible without user input.
const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Launch the transcript pad window. Blocks until the window closes.
pub fn run_app(
    controller: Arc<PipelineController>,
    preselected_device: Option<String>,
) -> Result<(), DomainError> {
    let devices = controller.list_input_devices()?;
    if devices.is_empty() {
        return Err(DomainError::NoInputDevices);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 640.0])
            .with_min_inner_size([480.0, 320.0]),
        ..Default::default()
    };

    eframe::run_native(
        "TalkPad - Live Transcription Editor",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(TranscriptApp::new(
                controller,
                devices,
                preselected_device,
            )))
        }),
    )
    .map_err(|e| DomainError::Ui(e.to_string()))
}

/// The transcript pad: a device picker, Start / Stop / Toggle Editing
/// actions, and the scrollable text surface fed by the display worker.
struct TranscriptApp {
    controller: Arc<PipelineController>,
    devices: Vec<AudioDevice>,
    selected: usize,
    status: Option<String>,
}

impl TranscriptApp {
    fn new(
        controller: Arc<PipelineController>,
        devices: Vec<AudioDevice>,
        preselected_device: Option<String>,
    ) -> Self {
        let selected = preselected_device
            .and_then(|id| devices.iter().position(|d| d.id == id))
            .or_else(|| devices.iter().position(|d| d.is_default))
            .unwrap_or(0);

        Self {
            controller,
            devices,
            selected,
            status: None,
        }
    }

    fn start_clicked(&mut self) {
        let device_id = self.devices[self.selected].id.clone();
        info!(device = %device_id, "Start requested");
        if let Err(e) = self.controller.start(Some(&device_id)) {
            error!(error = %e, "Failed to start pipeline");
            self.status = Some(format!("Failed to start: {e}"));
        } else {
            self.status = None;
        }
    }

    /// Stop the pipeline and close the application; the transcript is
    /// persisted before this returns.
    fn stop_clicked(&mut self, ctx: &egui::Context) {
        info!("Stop requested");
        if let Err(e) = self.controller.stop() {
            error!(error = %e, "Failed to stop pipeline");
            self.status = Some(format!("Failed to stop: {e}"));
            return;
        }
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }
}

impl eframe::App for TranscriptApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let state = self.controller.state();
        let running = state == PipelineState::Running;

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.add_enabled_ui(state == PipelineState::Idle, |ui| {
                    egui::ComboBox::from_label("Microphone")
                        .selected_text(self.devices[self.selected].name.clone())
                        .show_ui(ui, |ui| {
                            for (i, device) in self.devices.iter().enumerate() {
                                ui.selectable_value(&mut self.selected, i, &device.name);
                            }
                        });
                });

                ui.separator();

                if ui
                    .add_enabled(
                        state == PipelineState::Idle,
                        egui::Button::new("Start Transcription"),
                    )
                    .clicked()
                {
                    self.start_clicked();
                }

                if ui
                    .add_enabled(running, egui::Button::new("Stop Transcription"))
                    .clicked()
                {
                    self.stop_clicked(ctx);
                }

                if ui.button("Toggle Editing").clicked() {
                    self.controller.toggle_editing();
                }

                if self.controller.surface().is_editable() {
                    ui.label("editing");
                }
            });
        });

        if let Some(status) = self.status.clone() {
            egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
                ui.colored_label(ui.visuals().error_fg_color, status);
            });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let surface = self.controller.surface();
            let mut pad = surface.lock();
            let editable = pad.editable;
            let scroll = pad.take_scroll_request();

            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    let response = ui.add_sized(
                        ui.available_size(),
                        egui::TextEdit::multiline(&mut pad.text)
                            .interactive(editable)
                            .font(egui::TextStyle::Monospace),
                    );
                    if scroll {
                        response.scroll_to_me(Some(egui::Align::BOTTOM));
                    }
                });
        });

        if running {
            ctx.request_repaint_after(REFRESH_INTERVAL);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // Window closed without pressing Stop: shut the pipeline down and
        // persist what was transcribed.
        if self.controller.state() == PipelineState::Running {
            if let Err(e) = self.controller.stop() {
                error!(error = %e, "Failed to stop pipeline on exit");
            }
        }
    }
}

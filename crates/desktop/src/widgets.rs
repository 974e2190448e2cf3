//! Small reusable pieces of the chat panel: the styled action button and the typing indicator.

use eframe::egui;
use std::time::Duration;

/// Color scheme for [`action_button`].
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonVariant {
    #[default]
    Yellow,
    White,
    Blue,
}

impl ButtonVariant {
    fn colors(self) -> (egui::Color32, egui::Color32, Option<egui::Color32>) {
        // (fill, text, border)
        match self {
            ButtonVariant::Yellow => (
                egui::Color32::from_rgb(0xfa, 0xcc, 0x15),
                egui::Color32::BLACK,
                None,
            ),
            ButtonVariant::White => (
                egui::Color32::WHITE,
                egui::Color32::BLACK,
                Some(egui::Color32::from_rgb(0xd1, 0xd5, 0xdb)),
            ),
            ButtonVariant::Blue => (
                egui::Color32::from_rgb(0x25, 0x63, 0xeb),
                egui::Color32::WHITE,
                None,
            ),
        }
    }
}

/// Filled, bold-label button used for Send and quick replies.
pub fn action_button(ui: &mut egui::Ui, text: &str, variant: ButtonVariant, enabled: bool) -> egui::Response {
    let (fill, text_color, border) = variant.colors();
    let stroke = border
        .map(|c| egui::Stroke::new(1.0, c))
        .unwrap_or(egui::Stroke::NONE);
    let button = egui::Button::new(egui::RichText::new(text).strong().color(text_color))
        .fill(fill)
        .stroke(stroke)
        .rounding(egui::Rounding::same(4.0))
        .min_size(egui::vec2(72.0, 28.0));
    ui.add_enabled(enabled, button)
}

const DOT_RADIUS: f32 = 4.0;
const DOT_GAP: f32 = 4.0;
const BOUNCE_HEIGHT: f32 = 6.0;
const CYCLE_SECS: f64 = 0.6;
const DOT_DELAY_SECS: f64 = 0.1;

/// Vertical offset (px, upward) and darkness (0..=1) of one dot at `phase` in 0..1.
///
/// Dots rest for the last fifth of the cycle and peak at 40%.
pub fn dot_bounce(phase: f64) -> (f32, f32) {
    let p = phase.rem_euclid(1.0);
    if p >= 0.8 {
        return (0.0, 0.0);
    }
    let t = (p / 0.8 * std::f64::consts::PI).sin() as f32;
    (t * BOUNCE_HEIGHT, t)
}

/// Three bouncing dots, shown while the agent is composing. Keeps the UI repainting while visible.
pub fn typing_indicator(ui: &mut egui::Ui) -> egui::Response {
    let size = egui::vec2(
        3.0 * DOT_RADIUS * 2.0 + 2.0 * DOT_GAP,
        DOT_RADIUS * 2.0 + BOUNCE_HEIGHT + 4.0,
    );
    let (rect, response) = ui.allocate_exact_size(size, egui::Sense::hover());
    let time = ui.input(|i| i.time);
    let rest = egui::Color32::from_rgb(0xa0, 0xa0, 0xa0);
    let peak = egui::Color32::from_rgb(0x4b, 0x4b, 0x4b);

    for i in 0..3 {
        let phase = (time - i as f64 * DOT_DELAY_SECS) / CYCLE_SECS;
        let (lift, darkness) = dot_bounce(phase);
        let center = egui::pos2(
            rect.left() + DOT_RADIUS + i as f32 * (DOT_RADIUS * 2.0 + DOT_GAP),
            rect.bottom() - DOT_RADIUS - lift,
        );
        let color = lerp_color(rest, peak, darkness);
        ui.painter().circle_filled(center, DOT_RADIUS, color);
    }
    ui.ctx().request_repaint_after(Duration::from_millis(16));
    response
}

fn lerp_color(a: egui::Color32, b: egui::Color32, t: f32) -> egui::Color32 {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    egui::Color32::from_rgb(mix(a.r(), b.r()), mix(a.g(), b.g()), mix(a.b(), b.b()))
}

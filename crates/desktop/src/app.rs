//! Converse Copilot Desktop — egui app state and UI.

use crate::widgets::{self, ButtonVariant};
use eframe::egui;
use lib::chat::{ChatSession, SubmitAction};
use lib::link::{LinkEvent, LinkHandle};
use lib::normalize::CanonicalButton;
use lib::transcript::ChatMessage;
use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;

const LOG_BUFFER_MAX_LINES: usize = 2000;
const BUBBLE_MAX_WIDTH: f32 = 480.0;
const ACCENT: egui::Color32 = egui::Color32::from_rgb(0xae, 0x00, 0xff);
const USER_FILL: egui::Color32 = egui::Color32::from_rgb(0xdb, 0xea, 0xfe);

/// Ring buffer of log lines for the Logs screen. Written by DesktopLogger.
static LOG_LINES: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn log_buffer() -> &'static Mutex<VecDeque<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()))
}

fn push_log_line(line: String) {
    if let Ok(mut buf) = log_buffer().lock() {
        buf.push_back(line);
        while buf.len() > LOG_BUFFER_MAX_LINES {
            buf.pop_front();
        }
    }
}

/// Logger that appends to LOG_LINES for display in the Logs screen.
struct DesktopLogger;

impl log::Log for DesktopLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let line = format!(
            "{} [{}] {}",
            clock_time(),
            record.level(),
            record.args()
        );
        push_log_line(line);
    }

    fn flush(&self) {}
}

fn clock_time() -> String {
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = t.as_secs();
    let millis = t.subsec_millis();
    let h = (secs / 3600) % 24;
    let m = (secs / 60) % 60;
    let s = secs % 60;
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, millis)
}

static LOGGER: DesktopLogger = DesktopLogger;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum Screen {
    #[default]
    Chat,
    Logs,
}

/// Socket state as shown in the header.
#[derive(Clone, PartialEq, Eq)]
enum LinkStatus {
    Connecting,
    Open,
    Offline(Option<String>),
}

pub struct ConverseApp {
    /// Transcript, composing flag and offline fallback.
    session: ChatSession,
    /// Sending side of the socket. Dropping it closes the connection.
    link: Option<LinkHandle>,
    /// Events from the link thread; None once the link has ended.
    link_events: Option<UnboundedReceiver<LinkEvent>>,
    link_status: LinkStatus,
    /// Current input text for the send box.
    chat_input: String,
    current_screen: Screen,
}

impl ConverseApp {
    /// Space between the main screen title and the content below.
    const SCREEN_TITLE_BOTTOM_SPACING: f32 = 18.0;
    /// Space between the bottom of the content and the window edge.
    const SCREEN_FOOTER_SPACING: f32 = 24.0;
    /// How often to wake up while idle so link events and simulated replies are noticed.
    const POLL_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let _ = LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()));
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Debug);
        log::info!("desktop started");

        let config = match lib::config::load_config(None) {
            Ok((config, _)) => config,
            Err(e) => {
                log::error!("failed to load config, using defaults: {:#}", e);
                lib::config::Config::default()
            }
        };
        let session = ChatSession::from_config(&config.chat);
        let url = lib::config::resolve_endpoint(&config);

        let (link, link_events, link_status) = match lib::link::spawn_thread(url) {
            Ok((handle, events)) => (Some(handle), Some(events), LinkStatus::Connecting),
            Err(e) => {
                log::error!("failed to start websocket link: {:#}", e);
                (None, None, LinkStatus::Offline(Some(format!("{:#}", e))))
            }
        };

        Self {
            session,
            link,
            link_events,
            link_status,
            chat_input: String::new(),
            current_screen: Screen::default(),
        }
    }

    /// Drain link events into the session. Call each frame.
    fn poll_link(&mut self) {
        loop {
            let ev = match &mut self.link_events {
                Some(rx) => match rx.try_recv() {
                    Ok(e) => e,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.link_events = None;
                        self.mark_offline(None);
                        break;
                    }
                },
                None => break,
            };
            match ev {
                LinkEvent::Connected => {
                    self.link_status = LinkStatus::Open;
                    self.session.set_connected(true);
                }
                LinkEvent::Frame(raw) => {
                    let n = self.session.receive_frame(&raw);
                    log::debug!("added {} agent message(s)", n);
                }
                LinkEvent::Undelivered(text) => {
                    self.mark_offline(None);
                    self.session.delivery_failed(&text, Instant::now());
                }
                LinkEvent::Closed => self.mark_offline(None),
                LinkEvent::Failed(e) => self.mark_offline(Some(e)),
            }
        }
    }

    fn mark_offline(&mut self, reason: Option<String>) {
        self.session.set_connected(false);
        self.link = None;
        if !matches!(self.link_status, LinkStatus::Offline(Some(_))) {
            self.link_status = LinkStatus::Offline(reason);
        }
    }

    /// Carry out what the session asked for after a submit.
    fn dispatch(&mut self, action: SubmitAction) {
        match action {
            SubmitAction::Ignored => {}
            SubmitAction::Transmit(text) => {
                let sent = match &self.link {
                    Some(link) => link.send(text.clone()),
                    None => Err(anyhow::anyhow!("link is closed")),
                };
                if let Err(e) = sent {
                    log::warn!("send failed: {}", e);
                    self.mark_offline(None);
                    self.session.delivery_failed(&text, Instant::now());
                }
            }
            SubmitAction::Simulated { due } => {
                log::debug!(
                    "simulated reply due in {} ms",
                    due.saturating_duration_since(Instant::now()).as_millis()
                );
            }
        }
    }

    fn send_input(&mut self) {
        let text = std::mem::take(&mut self.chat_input);
        if text.trim().is_empty() {
            self.chat_input = text;
            return;
        }
        let action = self.session.submit(&text, Instant::now());
        self.dispatch(action);
    }

    fn agent_avatar(ui: &mut egui::Ui) {
        let (rect, _) = ui.allocate_exact_size(egui::vec2(30.0, 30.0), egui::Sense::hover());
        ui.painter().circle_filled(rect.center(), 15.0, ACCENT);
        ui.painter().text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            "🌙",
            egui::FontId::proportional(18.0),
            egui::Color32::WHITE,
        );
    }

    /// Renders one message bubble. Returns the label of a quick reply the user clicked.
    fn render_chat_message(ui: &mut egui::Ui, m: &ChatMessage) -> Option<String> {
        let is_user = m.is_user();
        let mut clicked = None;
        let layout = if is_user {
            egui::Layout::right_to_left(egui::Align::Max)
        } else {
            egui::Layout::left_to_right(egui::Align::Max)
        };
        ui.with_layout(layout, |ui| {
            if !is_user {
                Self::agent_avatar(ui);
            }
            let frame = egui::Frame::none()
                .fill(if is_user {
                    USER_FILL
                } else {
                    ui.style().visuals.extreme_bg_color
                })
                .stroke(egui::Stroke::new(
                    1.0,
                    ui.style().visuals.widgets.noninteractive.bg_stroke.color,
                ))
                .rounding(egui::Rounding::same(8.0))
                .inner_margin(egui::Margin::symmetric(12.0, 8.0));
            frame.show(ui, |ui| {
                ui.set_max_width(BUBBLE_MAX_WIDTH);
                ui.with_layout(egui::Layout::top_down(egui::Align::Min), |ui| {
                    for line in m.text.split('\n') {
                        ui.label(line);
                    }
                    if m.buttons.is_empty() {
                        return;
                    }
                    ui.add_space(6.0);
                    ui.horizontal_wrapped(|ui| {
                        for b in &m.buttons {
                            match b {
                                CanonicalButton::QuickReply { label } => {
                                    if widgets::action_button(ui, label, ButtonVariant::White, true)
                                        .clicked()
                                    {
                                        clicked = Some(label.clone());
                                    }
                                }
                                CanonicalButton::CallToAction { label, href } => {
                                    ui.hyperlink_to(label.as_str(), href);
                                }
                            }
                        }
                    });
                });
            });
        });
        clicked
    }

    /// Render the chat panel: message list with stick-to-bottom, typing indicator, send box.
    fn ui_chat(&mut self, ui: &mut egui::Ui) {
        let row_height = ui.spacing().interact_size.y + 16.0;
        let messages_height =
            (ui.available_height() - row_height - Self::SCREEN_FOOTER_SPACING).max(80.0);

        let mut quick_reply = None;
        let composing = self.session.is_composing();
        egui::ScrollArea::vertical()
            .max_height(messages_height)
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for m in self.session.transcript().messages() {
                    if let Some(label) = Self::render_chat_message(ui, m) {
                        quick_reply = Some(label);
                    }
                    ui.add_space(8.0);
                }
                if composing {
                    ui.horizontal(|ui| {
                        Self::agent_avatar(ui);
                        egui::Frame::none()
                            .fill(ui.style().visuals.extreme_bg_color)
                            .rounding(egui::Rounding::same(8.0))
                            .inner_margin(egui::Margin::symmetric(12.0, 8.0))
                            .show(ui, |ui| {
                                widgets::typing_indicator(ui);
                            });
                    });
                }
            });
        if let Some(label) = quick_reply {
            let action = self.session.quick_reply(&label, Instant::now());
            self.dispatch(action);
        }

        ui.separator();
        ui.horizontal(|ui| {
            let send_width = 88.0;
            let response = ui.add_sized(
                [ui.available_width() - send_width, row_height - 8.0],
                egui::TextEdit::singleline(&mut self.chat_input)
                    .hint_text("Describe the message that you want to create..."),
            );
            let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            let clicked = widgets::action_button(ui, "Send", ButtonVariant::Yellow, true).clicked();
            if enter || clicked {
                self.send_input();
                response.request_focus();
            }
        });
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }

    fn ui_logs_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Logs");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        let lines: Vec<String> = log_buffer()
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();

        let available = ui.available_height();
        let scroll_height = (available - Self::SCREEN_FOOTER_SPACING).max(0.0);
        egui::ScrollArea::vertical()
            .max_height(scroll_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &lines {
                    ui.label(
                        egui::RichText::new(line.as_str()).family(egui::FontFamily::Monospace),
                    );
                }
                if lines.is_empty() {
                    ui.label("No log output yet.");
                }
            });
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }

    fn status_label(&self) -> egui::RichText {
        match &self.link_status {
            LinkStatus::Connecting => egui::RichText::new("Connecting…").weak(),
            LinkStatus::Open => egui::RichText::new("Connected").color(egui::Color32::DARK_GREEN),
            LinkStatus::Offline(_) => {
                egui::RichText::new("Offline (simulated replies)").color(egui::Color32::DARK_RED)
            }
        }
    }
}

impl eframe::App for ConverseApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_link();
        self.session.poll_simulated(Instant::now());
        ctx.request_repaint_after(Self::POLL_INTERVAL);

        let status_text = self.status_label();
        let offline_reason = match &self.link_status {
            LinkStatus::Offline(Some(reason)) => Some(reason.clone()),
            _ => None,
        };
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| {
                    ui.add_space(16.0);
                    ui.horizontal(|ui| {
                        ui.label(egui::RichText::new("🌙").size(24.0).color(ACCENT));
                        ui.heading("Converse Copilot");
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            let logs = self.current_screen == Screen::Logs;
                            if ui.selectable_label(logs, "Logs").clicked() {
                                self.current_screen = Screen::Logs;
                            }
                            if ui.selectable_label(!logs, "Chat").clicked() {
                                self.current_screen = Screen::Chat;
                            }
                            ui.add_space(12.0);
                            let status = ui.label(status_text);
                            if let Some(reason) = offline_reason {
                                let _ = status.on_hover_text(reason);
                            }
                        });
                    });
                    ui.add_space(16.0);
                });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| match self.current_screen {
                    Screen::Chat => {
                        ui.add_space(16.0);
                        self.ui_chat(ui);
                    }
                    Screen::Logs => self.ui_logs_screen(ui),
                });
        });
    }
}

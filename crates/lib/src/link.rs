//! The single WebSocket link to the agent backend.
//!
//! A [`LinkTask`] owns the socket: it connects, forwards inbound text frames as
//! [`LinkEvent::Frame`], and writes whatever is queued through the [`LinkHandle`]. Dropping
//! the handle closes the socket. Errors are reported as events and logged; there is no
//! reconnect.

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Something that happened on the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Socket is open; sends go over the wire from now on.
    Connected,
    /// One inbound text frame, unparsed.
    Frame(String),
    /// Text that was queued through [`LinkHandle::send`] but never written. Reported just
    /// before the link ends.
    Undelivered(String),
    /// Peer closed the socket or the handle was dropped.
    Closed,
    /// Connect or transport error. The link is no longer usable.
    Failed(String),
}

/// Sending side of a link, held by the UI.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    outbound: mpsc::UnboundedSender<String>,
}

impl LinkHandle {
    /// Queue a text frame. Fails only when the link task has already stopped.
    pub fn send(&self, text: impl Into<String>) -> Result<()> {
        self.outbound
            .send(text.into())
            .map_err(|_| anyhow!("link is closed"))
    }
}

/// The task that drives one socket. Run it with [`LinkTask::run`].
pub struct LinkTask {
    url: String,
    outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

/// Create a link for `url` without starting it.
pub fn channel(
    url: impl Into<String>,
) -> (LinkHandle, mpsc::UnboundedReceiver<LinkEvent>, LinkTask) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (ev_tx, ev_rx) = mpsc::unbounded_channel();
    let task = LinkTask {
        url: url.into(),
        outbound: out_rx,
        events: ev_tx,
    };
    (LinkHandle { outbound: out_tx }, ev_rx, task)
}

/// Start a link on the current tokio runtime.
pub fn spawn(url: impl Into<String>) -> (LinkHandle, mpsc::UnboundedReceiver<LinkEvent>) {
    let (handle, events, task) = channel(url);
    tokio::spawn(task.run());
    (handle, events)
}

/// Start a link on its own thread with a private runtime. For callers without tokio
/// (the desktop UI loop); poll the receiver with `try_recv`.
pub fn spawn_thread(
    url: impl Into<String>,
) -> Result<(LinkHandle, mpsc::UnboundedReceiver<LinkEvent>)> {
    let (handle, events, task) = channel(url);
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building link runtime")?;
    std::thread::Builder::new()
        .name("converse-link".to_string())
        .spawn(move || rt.block_on(task.run()))
        .context("spawning link thread")?;
    Ok((handle, events))
}

impl LinkTask {
    /// Connect and pump frames until either side closes. Always ends with
    /// [`LinkEvent::Closed`] or [`LinkEvent::Failed`], preceded by one
    /// [`LinkEvent::Undelivered`] per queued text that never made it out.
    pub async fn run(mut self) {
        let end = match self.pump().await {
            Ok(()) => LinkEvent::Closed,
            Err(e) => {
                log::error!("websocket error: {:#}", e);
                LinkEvent::Failed(format!("{:#}", e))
            }
        };
        self.outbound.close();
        while let Ok(text) = self.outbound.try_recv() {
            log::warn!("link ended before sending: {}", text);
            let _ = self.events.send(LinkEvent::Undelivered(text));
        }
        log::info!("websocket disconnected from {}", self.url);
        let _ = self.events.send(end);
    }

    async fn pump(&mut self) -> Result<()> {
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .with_context(|| format!("connecting to {}", self.url))?;
        log::info!("connected to websocket server at {}", self.url);
        let _ = self.events.send(LinkEvent::Connected);

        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                out = self.outbound.recv() => {
                    let Some(text) = out else {
                        let _ = sink.close().await;
                        return Ok(());
                    };
                    sink.send(Message::Text(text)).await.context("sending frame")?;
                }
                inbound = stream.next() => {
                    let Some(msg) = inbound else { return Ok(()) };
                    match msg.context("reading frame")? {
                        Message::Text(text) => {
                            let _ = self.events.send(LinkEvent::Frame(text));
                        }
                        Message::Binary(bytes) => match String::from_utf8(bytes) {
                            Ok(text) => {
                                let _ = self.events.send(LinkEvent::Frame(text));
                            }
                            Err(_) => log::warn!("dropping non-UTF-8 binary frame"),
                        },
                        Message::Close(_) => return Ok(()),
                        _ => {}
                    }
                }
            }
        }
    }
}

//! Integration test: run a throwaway agent socket on a free port, chat through the link,
//! and check what lands in the transcript. Needs no real backend.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};
use lib::chat::{ChatSession, SubmitAction};
use lib::link::{self, LinkEvent};
use lib::normalize::CanonicalButton;
use lib::transcript::Origin;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

async fn agent_socket(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(reply_loop)
}

/// Answers each text frame with two JSON objects glued into one frame.
async fn reply_loop(mut socket: WebSocket) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let first = serde_json::json!({
            "content": format!("Draft for: {}", text),
            "buttons": [
                { "type": "QUICK_REPLY", "text": "Shorter" },
                { "type": "Call To Action", "text": "Call us", "phone_number": "+15550100" },
                { "type": "carousel", "text": "ignored" }
            ]
        });
        let second = serde_json::json!({ "Body": "Anything else?" });
        let frame = format!("{}{}", first, second);
        if socket.send(Message::Text(frame)).await.is_err() {
            break;
        }
    }
}

async fn start_agent() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind agent listener");
    let port = listener.local_addr().expect("local_addr").port();
    let app = Router::new().route("/ws", get(agent_socket));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("ws://127.0.0.1:{}/ws", port)
}

async fn next_event(events: &mut UnboundedReceiver<LinkEvent>) -> LinkEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("link event within 5s")
        .expect("link event channel open")
}

#[tokio::test]
async fn chat_turn_over_link_fills_transcript() {
    let url = start_agent().await;
    let (handle, mut events) = link::spawn(url);

    let mut session = ChatSession::new("Welcome", Duration::from_secs(2));
    assert_eq!(next_event(&mut events).await, LinkEvent::Connected);
    session.set_connected(true);

    let SubmitAction::Transmit(text) = session.submit("spring sale", Instant::now()) else {
        panic!("expected transmit while connected");
    };
    handle.send(text).expect("queue frame");
    assert!(session.is_composing());

    let LinkEvent::Frame(raw) = next_event(&mut events).await else {
        panic!("expected a frame");
    };
    assert_eq!(session.receive_frame(&raw), 2);
    assert!(!session.is_composing());

    let msgs = session.transcript().messages();
    assert_eq!(msgs.len(), 4);
    assert_eq!(msgs[1].origin, Origin::User);
    assert_eq!(msgs[2].text, "Draft for: spring sale");
    assert_eq!(
        msgs[2].buttons,
        vec![
            CanonicalButton::QuickReply {
                label: "Shorter".to_string()
            },
            CanonicalButton::CallToAction {
                label: "Call us".to_string(),
                href: "tel:+15550100".to_string()
            },
        ]
    );
    assert_eq!(msgs[3].text, "Anything else?");

    drop(handle);
    assert_eq!(next_event(&mut events).await, LinkEvent::Closed);
}

#[tokio::test]
async fn unreachable_endpoint_reports_failure() {
    let url = format!("ws://127.0.0.1:{}/ws", free_port());
    let (handle, mut events) = link::spawn(url);
    assert!(matches!(next_event(&mut events).await, LinkEvent::Failed(_)));

    // Link is gone; the session would fall back to the simulated reply.
    assert!(handle.send("hello").is_err());
}

#[test]
fn link_on_own_thread_connects() {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let url = rt.block_on(start_agent());
    let (handle, mut events) = link::spawn_thread(url).expect("spawn link thread");

    let deadline = Instant::now() + Duration::from_secs(5);
    let first = loop {
        if let Ok(ev) = events.try_recv() {
            break ev;
        }
        assert!(Instant::now() < deadline, "no link event within 5s");
        std::thread::sleep(Duration::from_millis(20));
    };
    assert_eq!(first, LinkEvent::Connected);
    handle.send("ping").expect("queue frame");
}

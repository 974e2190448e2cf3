//! Converse Copilot core library: inbound frame normalization, the chat transcript,
//! the WebSocket link, and configuration, shared by the CLI and the desktop panel.

pub mod chat;
pub mod config;
pub mod init;
pub mod link;
pub mod normalize;
pub mod transcript;

pub mod api_client;
pub mod channel_hub;
pub mod chat;
pub mod config;
pub mod constants;
pub mod events;
pub mod message;
pub mod panel;
pub mod persona;
pub mod session;
pub mod stream_sink;
pub mod transport;

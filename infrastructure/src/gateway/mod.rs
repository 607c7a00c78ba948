//! Model transport adapters.

pub mod http;

pub use http::{HttpChatGateway, HttpGatewaySettings};

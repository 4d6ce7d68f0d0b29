//! HTTP relay in front of the remote vision model.

mod handlers;
mod server;
mod upstream;
#[cfg(test)]
mod tests;

pub use server::{local_base_url, RelayServer, RelayServerBuilder};
pub use upstream::{GroqChatClient, VisionModel, MODEL};

pub mod client;
pub mod generator;
pub mod messages;

pub use client::NatsClient;
pub use generator::NatsGenerator;
pub use messages::CaptionMessage;

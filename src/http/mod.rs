mod client;
mod response;

pub use client::ClientFactory;
pub use response::Response;

pub mod client;
pub mod handler;
pub mod protocol;

pub use client::ServiceClient;
pub use handler::{artifact_store, collaborators, Gate};
pub use protocol::{Request, Response};

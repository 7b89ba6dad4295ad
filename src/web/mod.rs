pub mod client_detection;
pub mod request_context;

pub use client_detection::{ClientDetection, ClientDetector};
pub use request_context::RequestContext;

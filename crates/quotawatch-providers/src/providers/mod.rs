//! Provider clients
//!
//! Each client fetches one provider's quota endpoint and normalizes the
//! response with a pure `to_snapshot` so the conversion is testable
//! without a network.

pub mod copilot;
pub mod synthetic;
pub mod zai;

pub use copilot::{CopilotClient, CopilotResponse};
pub use synthetic::{SyntheticClient, SyntheticResponse};
pub use zai::{ZaiClient, ZaiResponse};

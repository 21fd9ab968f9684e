//! Beatmap request pipeline.
//!
//! A chat message flows through [`handler::RequestHandler`]: the beatmap
//! reference is parsed, metadata fetched, [`admission::AdmissionPipeline`]
//! decides, and [`dispatch::RequestDispatcher`] fans the accepted request out.

pub mod admission;
pub mod cooldown;
pub mod dispatch;
pub mod format;
pub mod handler;

pub use admission::{AdmissionDecision, AdmissionPipeline};
pub use cooldown::{CooldownKey, CooldownTracker};
pub use dispatch::RequestDispatcher;
pub use handler::{HandleOutcome, RequestHandler};

pub mod audit;
pub mod config;
pub mod logging;
pub mod status;

pub use status::{EmailType, FollowUpStage, FollowUpStatus, LeadStatus, ParseStatusError};
pub use tracing;

#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}

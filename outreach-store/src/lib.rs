pub mod backends;
pub mod config;
pub mod error;
pub mod followup;
pub mod lead;
pub mod r#trait;
pub mod types;

pub use backends::{FileLeadStore, MemoryLeadStore, TestLeadStore};
pub use config::{StoreBackend, StoreConfig};
pub use error::{Result, SerializationError, StoreError};
pub use followup::{FollowUp, FollowUpQuery};
pub use lead::{Lead, LeadPatch, LeadQuery};
pub use r#trait::{FollowUpStore, LeadStore, Store};
pub use types::{FollowUpId, LeadId};

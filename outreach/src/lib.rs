pub mod controller;

pub use controller::{Outreach, SHUTDOWN_BROADCAST};

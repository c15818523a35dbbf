mod file;
mod memory;

pub use file::FileLeadStore;
pub use memory::MemoryLeadStore;
pub use test::TestLeadStore;

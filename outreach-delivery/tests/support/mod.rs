pub mod faulty_store;
pub mod mock_adapters;

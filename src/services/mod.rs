pub mod store;
pub mod upload;

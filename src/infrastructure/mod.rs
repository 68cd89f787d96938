pub mod document_store;
pub mod error;
pub mod memory_store;
pub mod sqlite_store;

pub mod article_store;
pub mod auth;
pub mod document_store;
pub mod key_value;
pub mod local_store;
pub mod memory_document_store;
pub mod remote_store;

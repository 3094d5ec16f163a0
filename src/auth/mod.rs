pub mod oauth;
pub mod session;
pub mod token_file;
pub mod token_manager;
pub mod token_store;

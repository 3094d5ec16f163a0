pub mod format;
pub mod webhook;

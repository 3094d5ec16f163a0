//! Polls several Gmail accounts for recent unread mail and posts one digest
//! per account to that account's Discord-style webhook.

pub mod auth;
pub mod config;
pub mod daemon;
pub mod digest;
pub mod domain;
pub mod mail;

#[cfg(test)]
mod testutil;

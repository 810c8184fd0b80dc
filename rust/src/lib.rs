//! Local credential store, field cipher, and owner-scoped task list.
//!
//! One encrypted preference file holds the installation's credential record
//! and logged-in flag. Tasks live in a separate document store; their text
//! fields are encrypted with a key derived for the user who owns them.

pub mod config;
pub mod credentials;
pub mod crypto;
mod fsio;
pub mod store;
pub mod tasks;

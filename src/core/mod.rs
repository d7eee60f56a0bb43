//! Core types shared by every part of the update client.
//!
//! At the moment this is the error model: [`UpdateError`] and its
//! [`UpdateResult`] alias for library code, and [`ErrorContext`] for turning an
//! error into something worth showing a user.

pub mod error;

pub use error::{ErrorContext, UpdateError, UpdateResult, user_friendly_error};

//! Core domain + application logic for the transaction relay bot.
//!
//! This crate is framework-agnostic. Telegram (webhook or polling) lives in
//! an adapter crate and reaches the core through [`dispatcher::EventDispatcher`]
//! and the [`messaging::port::ReplyPort`] trait.

pub mod config;
pub mod config_cache;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod extraction;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod relay;
pub mod security;

pub use errors::{Error, Result};

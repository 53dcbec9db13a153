//! Outbound messaging abstraction (Telegram today).

pub mod port;

//! Relays assistant replies to HTTP clients as word-aligned Server-Sent Events.

extern crate alloc;

pub mod app;
pub mod common;
pub mod core;

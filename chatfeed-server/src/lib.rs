#![cfg_attr(not(test), forbid(unsafe_code))]

//! Live channel feeds that merge a push stream with cursor-anchored history
//! into one bounded, ordered, duplicate-free window.

pub mod buffer;
pub mod commands;
pub mod feed;
pub mod services;
pub mod tracer;

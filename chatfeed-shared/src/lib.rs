#![cfg_attr(not(test), forbid(unsafe_code))]

//! Message models and configuration shared by the chatfeed crates.

pub mod config;
pub mod models;

// Capture-driven unit test synthesis for C functions.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ports;

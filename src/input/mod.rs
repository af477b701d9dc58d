mod client;
mod config;
mod source;

pub mod toml_input;

pub use client::*;
pub use config::*;
pub use source::*;

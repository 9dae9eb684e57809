pub mod client;
pub mod config;
pub mod error;
pub mod instructions;
pub mod markup;
pub mod mask;
pub mod pipeline;
pub mod runner;
pub mod template;
pub mod thread;
pub mod timestamp;
pub mod update;

#[cfg(test)]
mod mock;

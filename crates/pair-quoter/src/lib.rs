// Library entry point for pair-quoter

pub mod bindings;
pub mod cache;
pub mod config;
pub mod engine;
pub mod registry;
pub mod resolver;
pub mod simulator;
pub mod types;

pub use ethers::types::{Address, U256};

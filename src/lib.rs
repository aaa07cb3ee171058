pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod filter;
pub mod generator;
pub mod output;
pub mod pool;
pub mod recursion;
pub mod runner;
pub mod utils;

#[cfg(test)]
mod tests;

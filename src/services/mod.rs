pub mod cli_runner;
pub mod config;
pub mod event_hub;
pub mod host;
#[cfg(test)]
pub mod testing;

pub mod client;
pub mod config;
pub mod diaries;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod model;
pub mod notifiers;
pub mod script;
pub mod time;

#[cfg(test)]
mod testing;

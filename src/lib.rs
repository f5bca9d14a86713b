//! coinwatch - periodic coin price collection with a small status API

pub mod client;
pub mod collector;
pub mod config;
pub mod scheduler;
pub mod store;
pub mod web;

pub use client::PriceClient;
pub use collector::Collector;
pub use config::Config;
pub use scheduler::Scheduler;
pub use store::{PriceObservation, PriceSample, Store};

//! FoodFlow: donation lifecycle, aggregation and tracking over a key-value store.

pub mod accounts;
pub mod activity;
pub mod aggregate;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod seed;
pub mod store;
pub mod tracking;

#![doc = include_str!("../README.md")]
#![deny(clippy::nursery, clippy::pedantic, warnings)]
#![allow(clippy::module_name_repetitions)]

pub mod chain;
pub mod cli;
pub mod config;
pub mod database;
pub mod endpoint;
pub mod metrics;
pub mod observability;

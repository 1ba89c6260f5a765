pub mod config;
pub mod observability;
pub mod health;
pub mod error;
pub mod hashing;
pub mod chain;
pub mod ledger;
pub mod uploads;
pub mod service;
pub mod pages;
pub mod server;

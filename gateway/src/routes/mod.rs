//! HTTP route handlers.

pub mod blocks;
pub mod health;
pub mod network;
pub mod transactions;

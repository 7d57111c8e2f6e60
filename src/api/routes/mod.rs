//! API Routes
//!
//! Route handlers organized by functionality.

pub mod analysis;
pub mod chat;
pub mod foods;
pub mod forecast;
pub mod health;
pub mod patients;
pub mod readings;
pub mod scheduler;

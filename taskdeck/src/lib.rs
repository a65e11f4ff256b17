//! TaskDeck — task-management client with live-event reconciliation.

pub mod api;
pub mod config;
pub mod net;
pub mod socket;
pub mod tasks;

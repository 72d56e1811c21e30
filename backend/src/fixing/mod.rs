pub mod manager;
pub mod schedule;

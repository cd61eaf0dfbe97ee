pub mod factory;
pub mod observability;
pub mod runner;
pub mod sink;

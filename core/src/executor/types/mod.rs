pub mod opts;

pub use opts::*;

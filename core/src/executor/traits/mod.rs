pub mod observer;
pub mod runner;
pub mod sink;

pub use observer::*;
pub use runner::*;
pub use sink::*;

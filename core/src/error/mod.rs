pub mod code;
pub mod executor;
pub mod task;
pub mod validation;

pub use code::ErrorCode;
pub use executor::StackError;
pub use task::TaskError;
pub use validation::ValidationError;

pub mod jsonl;

pub use jsonl::JsonlSummarySink;

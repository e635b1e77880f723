pub mod executor;
pub mod pool;

pub use executor::{JobExecutor, Outcome, SkipReason};
pub use pool::WorkerPool;

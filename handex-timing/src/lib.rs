pub mod timer;

pub use timer::{CadenceStats, MonotonicTimer, Timer};

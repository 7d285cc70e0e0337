pub mod atomic;
pub mod consolidator;
pub mod error;
pub mod frame;
pub mod paths;
pub mod progress;
pub mod writer;

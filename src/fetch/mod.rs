pub mod aemet;
pub mod error;
pub mod rate_limiter;
pub mod retry;
pub mod source;

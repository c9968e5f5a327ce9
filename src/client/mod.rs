//! External service clients: the UCI engine and the content endpoint.

mod llm_client;
mod rate_limiter;
mod uci;

pub use llm_client::*;
pub use rate_limiter::*;
pub use uci::UciEngine;

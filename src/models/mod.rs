//! Core data models for tactica.
//!
//! Epistemic mapping:
//! - K_i (Knowledge): Closed enums for tags, tiers and step kinds
//! - B_i (Beliefs): Wrapped in Result/Option
//! - I^R (Resolvable): Config parameters and request weights
//! - I^B (Bounded): Error variants with fallback strategies

mod config;
mod error;
mod evaluation;
mod item;
mod lesson;
mod request;

pub use config::*;
pub use error::*;
pub use evaluation::*;
pub use item::*;
pub use lesson::*;
pub use request::*;

//! Pipeline module - candidate scoring, example selection and lesson assembly.

mod assembler;
mod lesson;
mod scorer;
mod selector;

pub use assembler::*;
pub use lesson::*;
pub use scorer::*;
pub use selector::*;

pub mod assembler;
pub mod error;
pub mod lexer;
pub mod listing;
pub mod symbol;
pub mod token;

pub use assembler::{Assembler, Phase};
pub use error::{Diagnostic, Error};

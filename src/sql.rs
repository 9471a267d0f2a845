pub mod parser;
pub mod statement;
pub mod tokenizer;
pub mod validator;

pub use parser::parse;
pub use statement::*;

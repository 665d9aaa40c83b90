mod code;
mod evaluator;

pub use code::{CODE_LENGTH, Code, CodeError, generate_secret};
pub use evaluator::{Score, evaluate, score};

pub mod cache;
pub mod evaluator;
pub mod external;
pub mod operators;

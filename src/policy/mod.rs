pub mod compile;
pub mod matcher;
pub mod model;

pub use matcher::Evaluator;
pub use model::{Action, Decision};

pub mod attempt;
pub mod queries;
pub mod scoring;
pub mod types;

pub use queries::*;
pub use types::*;

pub mod asserts;
pub mod bodies;
pub mod fixtures;

pub use asserts::*;
pub use bodies::*;
pub use fixtures::*;

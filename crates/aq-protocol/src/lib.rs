pub mod comparison;
pub mod location;
pub mod outcome;
pub mod query;
pub mod time;
pub mod workflow;

pub use comparison::*;
pub use location::*;
pub use outcome::*;
pub use query::*;
pub use workflow::*;

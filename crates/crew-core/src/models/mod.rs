pub mod agent;
pub mod result;
pub mod step;

pub use agent::*;
pub use result::*;
pub use step::*;

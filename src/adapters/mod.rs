//! Boundary adapters between the navigation core and the outside world.

pub mod clock;
pub mod ingest;
pub mod sim;
pub mod sink;
pub mod source;

pub use clock::*;
pub use ingest::*;
pub use sim::*;
pub use sink::*;
pub use source::*;

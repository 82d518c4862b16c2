pub mod compiler;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod executor;
pub mod locator;


pub use error::{HarnessError, LocatorError};
pub use events::{EventSink, NullSink, ReportSink, RunEvent, TracingSink};
pub use executor::Harness;

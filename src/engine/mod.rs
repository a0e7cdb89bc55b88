//! Recurring engine
//!
//! [`Materializer`] records a single due occurrence; [`CatchUpController`]
//! replays the missed ones of a definition in order. Both rely on the store's
//! conditional cursor advance for exactly-once materialization.

mod catch_up;
mod error;
mod materializer;

pub use catch_up::{CatchUpController, CatchUpError, CatchUpReport, CatchUpStop};
pub use error::EngineError;
pub use materializer::{Materialization, MaterializeOutcome, Materializer};

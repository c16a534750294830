//! Session histories backed by the collection store.
//!
//! Each history is loaded once per session and flushed to the store on every
//! change, so nothing lives in process-wide state.

mod appointments;
mod medications;

pub use appointments::*;
pub use medications::*;

//! Domain models for the dental practice core.

mod appointment;
mod budget;
mod catalog;
mod consultation;
mod odontogram;
mod patient;
mod periodontal;
mod tooth;

pub use appointment::*;
pub use budget::*;
pub use catalog::*;
pub use consultation::*;
pub use odontogram::*;
pub use patient::*;
pub use periodontal::*;
pub use tooth::*;

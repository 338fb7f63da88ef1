// Conversion engine - independent of the command line

pub mod core;
pub mod hardware;
pub mod probe;

pub use core::*;

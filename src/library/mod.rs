//! Independent and transport agnostic libraries
//!
//! Everything in here only depends on the [`Transport`](communication::Transport) abstraction,
//! concrete network implementations are located in [`communication::implementation`].

pub mod communication;
pub mod helpers;

/// Generic error type
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result with no value and a [`BoxedError`]
pub type EmptyResult = Result<(), BoxedError>;

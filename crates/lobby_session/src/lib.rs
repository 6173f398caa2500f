//! Session role management: the debounced election timer and the controller
//! state machine that drives advertisements and the game process.

pub mod controller;
pub mod election;

pub use controller::{Event, Outcome, SessionController, SessionRole};
pub use election::ElectionTimer;

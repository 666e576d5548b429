// src/validation/mod.rs

pub mod stability;
pub mod validator;

pub use stability::{GateState, Observation, StabilityGate};
pub use validator::Validator;

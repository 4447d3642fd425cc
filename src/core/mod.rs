// Collaborator traits and pacing

pub mod executor;
pub mod scheduler;

pub use executor::*;
pub use scheduler::*;

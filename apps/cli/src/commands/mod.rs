//! Command implementations

pub(crate) mod listeners;
pub(crate) mod rotate;

pub use listeners::ListenersArgs;
pub use rotate::RotateArgs;

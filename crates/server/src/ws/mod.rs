pub mod ephemeral;
pub mod events;
pub mod handler;
pub mod registry;

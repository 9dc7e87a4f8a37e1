pub mod constants;
pub mod events;
pub mod models;
pub mod validation;

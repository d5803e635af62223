pub mod events;
pub mod sessions;

pub mod app;
pub mod setup;
pub mod status;
pub mod sync;
pub mod verify;

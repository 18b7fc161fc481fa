pub mod policy;
pub mod setup;
pub mod status;
pub mod verify;

pub mod setup;
pub mod camera;
pub mod tiles;
pub mod debug;
pub mod window;

// Systems are imported directly where needed

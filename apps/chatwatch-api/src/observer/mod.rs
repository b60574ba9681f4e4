pub mod controller;
pub mod memory;
pub mod relay;
pub mod source;

pub use controller::Observer;

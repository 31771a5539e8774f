pub mod log;
pub mod alignment;
pub mod image_tools;
pub mod recognition;

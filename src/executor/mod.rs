pub mod clipboard;
pub mod driver;
pub mod input;
pub mod text_input;
pub mod window;

pub mod locator;
pub mod nms;
pub mod screenshot;
pub mod template;
pub mod types;

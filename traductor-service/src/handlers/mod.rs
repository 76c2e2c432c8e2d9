pub mod home;
pub mod translate;

pub use home::{home_handler, HOME_PATH};
pub use translate::{translate_handler, TRANSLATE_PATH};

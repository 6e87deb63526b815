pub mod image;
pub mod logging;
pub mod url;

pub mod config;
pub mod geo;
pub mod headless;
pub mod map;
pub mod palette;

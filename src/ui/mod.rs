pub mod popup;

pub use popup::{PopupRenderer, PopupState};

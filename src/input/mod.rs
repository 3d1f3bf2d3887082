pub mod dispatcher;
pub mod events;

// Re-export the essential types
pub use dispatcher::{HoverState, InteractionDispatcher, InteractionOutcome};
pub use events::{EventQueue, MapEvent};

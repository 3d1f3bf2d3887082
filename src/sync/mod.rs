pub mod controller;
pub mod state;

pub use controller::{LoadTicket, StateCallback, SyncController};
pub use state::{AppStateSnapshot, AreaKpis, FeatureSelection, StateAction};

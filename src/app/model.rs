mod state;

pub use state::{ActiveRequest, AppState};

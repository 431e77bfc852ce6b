mod health;
mod thread;

pub use health::handle_health;
pub use thread::handle_thread;

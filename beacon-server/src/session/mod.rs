mod candidate_queue;
mod session_error;
mod session_registry;

pub use candidate_queue::*;
pub use session_error::*;
pub use session_registry::*;

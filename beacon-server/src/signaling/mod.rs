mod app_state;
mod signaling_output;
mod signaling_service;
mod ws_handler;

pub use app_state::*;
pub use signaling_output::*;
pub use signaling_service::*;
pub use ws_handler::*;

mod config;
mod media;
mod negotiation;
mod session;
mod signaling;

pub use config::*;
pub use media::*;
pub use negotiation::*;
pub use session::*;
pub use signaling::*;

mod ice;
mod session;
mod signaling;

pub use ice::IceCandidate;
pub use session::{SessionId, SessionIdGenerator};
pub use signaling::{ClientMessage, ResponseStatus, ServerMessage, SessionRole};

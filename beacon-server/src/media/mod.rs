mod candidate_forwarder;
mod kurento;
mod media_broker;
mod media_client;
mod media_config;
mod media_error;

pub use candidate_forwarder::*;
pub use kurento::*;
pub use media_broker::*;
pub use media_client::*;
pub use media_config::*;
pub use media_error::*;

mod kurento_client;
mod kurento_protocol;

pub use kurento_client::*;

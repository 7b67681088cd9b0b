mod lifecycle;
mod negotiator;

pub use negotiator::*;

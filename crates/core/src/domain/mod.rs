pub mod message;
pub mod stats;

pub mod command;
pub mod controller;
pub mod error;
pub mod killer;
pub mod output;
pub mod process;

// Re-exports for convenience
pub use command::{EncoderProfile, StreamRequest};
pub use controller::{StopReport, StreamController, StreamStatus};
pub use error::StreamError;
pub use killer::{FallbackKiller, OsFamily, SystemKiller};
pub use output::OutputLineCodec;
pub use process::{EncodeHandle, StopOutcome};

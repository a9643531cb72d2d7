pub mod amount;
pub mod balance;
pub mod builder;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod outputs;
pub mod protocol;
pub mod selection;
pub mod sequencer;
pub mod signer;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use amount::Amount;
pub use engine::{TransferEngine, TransferRequest};
pub use error::EngineError;

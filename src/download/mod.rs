//! Retrieval of shared files.
//!
//! A request walks the [`GateChain`]; once every gate passed, the ticket is
//! redeemed with [`GateChain::deliver`] right before the bytes are streamed.

pub mod credential;
mod gate;
mod log;

pub use credential::{CredentialKind, IssuedCredential, PresentedCredentials};
pub use gate::{
    CredentialSubmission, Delivery, DeliveryTicket, DenyReason, GateChain, GateConfig,
    GateDecision, GateOutcome, GateState, Prompt, RetrievalRequest,
};
pub use log::{DownloadLogEntry, DownloadLogRepository, NewDownloadLog};

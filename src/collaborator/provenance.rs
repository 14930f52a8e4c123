#[cfg(test)]
use mockall::automock;
use tokio::sync::oneshot;

use crate::CallDescriptor;
use crate::Provenance;
use crate::ProvenanceError;

/// Outcome of asking the host for caller provenance
#[derive(Debug)]
pub enum ProvenanceCapture {
    Ready(Provenance),
    /// Resolves later; attached to the transaction if it arrives before emission
    Deferred(oneshot::Receiver<std::result::Result<Provenance, ProvenanceError>>),
    Unavailable,
}

impl ProvenanceCapture {
    /// Creates a deferred capture and the sender the host resolves it with
    pub fn deferred() -> (
        oneshot::Sender<std::result::Result<Provenance, ProvenanceError>>,
        Self,
    ) {
        let (tx, rx) = oneshot::channel();
        (tx, ProvenanceCapture::Deferred(rx))
    }
}

/// Best-effort caller provenance, asked once per transaction start
#[cfg_attr(test, automock)]
pub trait ProvenanceSource: Send + Sync {
    fn capture(
        &self,
        descriptor: &CallDescriptor,
    ) -> ProvenanceCapture;
}

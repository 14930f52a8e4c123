#[cfg(test)]
use mockall::automock;
use tracing::debug;
use tracing::info;

use crate::Result;
use crate::Transaction;

/// Receives finalized transactions, one at a time, in emission order
#[cfg_attr(test, automock)]
pub trait TransactionSink: Send {
    fn emit(
        &mut self,
        transaction: Transaction,
    ) -> Result<()>;
}

/// Writes a one-line summary per transaction through `tracing`, with one
/// debug line per event.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TransactionSink for TracingSink {
    fn emit(
        &mut self,
        transaction: Transaction,
    ) -> Result<()> {
        info!("{}", summarize(&transaction));
        for event in &transaction.events {
            debug!(
                seq = transaction.seq,
                "  {} {}",
                event.kind.name(),
                event.subject
            );
        }
        Ok(())
    }
}

/// Human-readable headline of a transaction, e.g.
/// `transaction #4 : set value of cell2:count (3 events, 12ms)`
pub fn summarize(transaction: &Transaction) -> String {
    let mut line = format!("transaction #{} : {}", transaction.seq, transaction.kind);
    if let Some(subject) = &transaction.subject {
        line.push_str(&format!(" of {subject}"));
    }
    if let Some(args) = &transaction.args {
        let args = args.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        line.push_str(&format!(" to {}", args.join(", ")));
    }
    if let Some(result) = &transaction.result {
        line.push_str(&format!(" = {result}"));
    }
    line.push_str(&format!(
        " ({} event{}, {}ms)",
        transaction.events.len(),
        if transaction.events.len() == 1 { "" } else { "s" },
        transaction.duration().as_millis()
    ));
    if let Some(owner) = transaction.provenance.as_ref().and_then(|p| p.owner.as_ref()) {
        line.push_str(&format!(" in {owner}"));
    }
    line
}

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use crate::EmitError;
use crate::Result;
use crate::Transaction;
use crate::TransactionSink;

use super::ManualClock;

/// Sink that keeps every emitted transaction for later inspection
#[derive(Clone, Default)]
pub struct RecordingSink {
    emitted: Arc<Mutex<Vec<Transaction>>>,
    attempted: Arc<Mutex<Vec<u64>>>,
    cost: Option<(ManualClock, Duration)>,
    fail_on: Option<u64>,
    panic_on: Option<u64>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every emit advances `clock` by `cost`
    pub fn with_cost(
        mut self,
        clock: ManualClock,
        cost: Duration,
    ) -> Self {
        self.cost = Some((clock, cost));
        self
    }

    pub fn failing_on(
        mut self,
        seq: u64,
    ) -> Self {
        self.fail_on = Some(seq);
        self
    }

    pub fn panicking_on(
        mut self,
        seq: u64,
    ) -> Self {
        self.panic_on = Some(seq);
        self
    }

    /// Sequence numbers of every transaction handed to the sink, including
    /// the ones it failed on
    pub fn attempted(&self) -> Vec<u64> {
        self.attempted.lock().unwrap().clone()
    }

    pub fn seqs(&self) -> Vec<u64> {
        self.emitted.lock().unwrap().iter().map(|tx| tx.seq).collect()
    }

    pub fn len(&self) -> usize {
        self.emitted.lock().unwrap().len()
    }

    pub fn take(&self) -> Vec<Transaction> {
        std::mem::take(&mut *self.emitted.lock().unwrap())
    }
}

impl TransactionSink for RecordingSink {
    fn emit(
        &mut self,
        transaction: Transaction,
    ) -> Result<()> {
        self.attempted.lock().unwrap().push(transaction.seq);
        if let Some((clock, cost)) = &self.cost {
            clock.advance(*cost);
        }
        if self.panic_on == Some(transaction.seq) {
            panic!("sink exploded on #{}", transaction.seq);
        }
        if self.fail_on == Some(transaction.seq) {
            return Err(EmitError::Rejected {
                seq: transaction.seq,
                reason: "formatter failure".to_string(),
            }
            .into());
        }
        self.emitted.lock().unwrap().push(transaction);
        Ok(())
    }
}

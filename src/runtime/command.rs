use serde_json::Value;
use tokio::sync::oneshot;

use crate::CallDescriptor;
use crate::CallScope;
use crate::HandleId;
use crate::Notification;

/// Requests processed by the logger task, in arrival order
#[derive(Debug)]
pub enum LoggerCommand {
    EnterCall {
        descriptor: CallDescriptor,
        ack: oneshot::Sender<CallScope>,
    },
    ExitCall {
        scope: CallScope,
        result: Option<Value>,
    },
    Notify(Notification),
    Settle {
        handle: HandleId,
        outcome: std::result::Result<Value, Value>,
    },
    Abort(HandleId),
    Flush,
    /// Flush and emit everything queued, then acknowledge
    Drain {
        ack: oneshot::Sender<()>,
    },
}

impl LoggerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            LoggerCommand::EnterCall { .. } => "enter_call",
            LoggerCommand::ExitCall { .. } => "exit_call",
            LoggerCommand::Notify(_) => "notify",
            LoggerCommand::Settle { .. } => "settle",
            LoggerCommand::Abort(_) => "abort",
            LoggerCommand::Flush => "flush",
            LoggerCommand::Drain { .. } => "drain",
        }
    }

    /// Settlement callbacks must not interleave with a synchronous call span
    pub(crate) fn is_settlement(&self) -> bool {
        matches!(self, LoggerCommand::Settle { .. } | LoggerCommand::Abort(_))
    }
}

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::json;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use tracing::warn;

use super::LoggerCommand;
use crate::CallDescriptor;
use crate::CallScope;
use crate::HandleId;
use crate::Notification;
use crate::Result;
use crate::RuntimeError;

/// Cloneable sender side of a running [`crate::LoggerRuntime`]
#[derive(Debug, Clone)]
pub struct LoggerHandle {
    commands: mpsc::Sender<LoggerCommand>,
}

impl LoggerHandle {
    pub(crate) fn new(commands: mpsc::Sender<LoggerCommand>) -> Self {
        Self { commands }
    }

    async fn send(
        &self,
        command: LoggerCommand,
    ) -> Result<()> {
        let name = command.name();
        self.commands
            .send(command)
            .await
            .map_err(|_| RuntimeError::CommandSendFailed { command: name }.into())
    }

    /// Reports the start of an intercepted store call. The returned scope
    /// must be handed back through [`Self::exit_call`].
    pub async fn enter_call(
        &self,
        descriptor: CallDescriptor,
    ) -> Result<CallScope> {
        let (ack, ack_rx) = oneshot::channel();
        self.send(LoggerCommand::EnterCall { descriptor, ack }).await?;
        ack_rx
            .await
            .map_err(|_| RuntimeError::AckReceiveFailed { command: "enter_call" }.into())
    }

    pub async fn exit_call(
        &self,
        scope: CallScope,
        result: Option<Value>,
    ) -> Result<()> {
        self.send(LoggerCommand::ExitCall { scope, result }).await
    }

    pub async fn notify(
        &self,
        notification: Notification,
    ) -> Result<()> {
        self.send(LoggerCommand::Notify(notification)).await
    }

    pub async fn settle(
        &self,
        handle: HandleId,
        outcome: std::result::Result<Value, Value>,
    ) -> Result<()> {
        self.send(LoggerCommand::Settle { handle, outcome }).await
    }

    pub async fn abort(
        &self,
        handle: HandleId,
    ) -> Result<()> {
        self.send(LoggerCommand::Abort(handle)).await
    }

    pub async fn flush(&self) -> Result<()> {
        self.send(LoggerCommand::Flush).await
    }

    /// Flushes and waits until every queued transaction reached the sink
    pub async fn drain(&self) -> Result<()> {
        let (ack, ack_rx) = oneshot::channel();
        self.send(LoggerCommand::Drain { ack }).await?;
        ack_rx
            .await
            .map_err(|_| RuntimeError::AckReceiveFailed { command: "drain" }.into())
    }

    /// Watches an asynchronous cell value until it settles or `token` is
    /// cancelled, and reports the outcome to the logger.
    ///
    /// The `pending` notification itself still comes from the store. A
    /// future that panics is reported as rejected.
    pub fn track_async<F>(
        &self,
        handle: HandleId,
        future: F,
        token: CancellationToken,
    ) -> JoinHandle<()>
    where
        F: Future<Output = std::result::Result<Value, Value>> + Send + 'static,
    {
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let command = tokio::select! {
                biased;
                _ = token.cancelled() => LoggerCommand::Abort(handle),
                outcome = AssertUnwindSafe(future).catch_unwind() => {
                    let outcome = outcome.unwrap_or_else(|_| Err(json!("panicked")));
                    LoggerCommand::Settle { handle, outcome }
                }
            };

            trace!("{} finished: {}", handle, command.name());
            if commands.send(command).await.is_err() {
                warn!("logger runtime stopped before {} was reported", handle);
            }
        })
    }
}

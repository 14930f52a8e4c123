use std::collections::VecDeque;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::LoggerCommand;
use super::LoggerHandle;
use crate::LoggerEngine;
use crate::Result;
use crate::RuntimeConfig;

/// Owns one engine and serializes every access to it on a single task
pub struct LoggerRuntime {
    engine: LoggerEngine,
    commands: mpsc::Receiver<LoggerCommand>,
    /// Settlement callbacks that arrived during a synchronous call span
    deferred: VecDeque<LoggerCommand>,
}

impl LoggerRuntime {
    pub fn new(
        config: &RuntimeConfig,
        engine: LoggerEngine,
    ) -> (Self, LoggerHandle) {
        let (tx, rx) = mpsc::channel(config.command_buffer);
        (
            Self {
                engine,
                commands: rx,
                deferred: VecDeque::new(),
            },
            LoggerHandle::new(tx),
        )
    }

    /// Processes commands and timers until `shutdown` fires or every handle
    /// is dropped. Commands already queued are still applied and every
    /// transaction is drained before the engine is handed back.
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<LoggerEngine> {
        info!("logger runtime started");

        loop {
            let next_deadline = self.engine.next_deadline();
            let force_deadline = self.engine.force_deadline();

            tokio::select! {
                biased;
                // P0: shutdown
                _ = shutdown.changed() => {
                    warn!("logger runtime shutdown signal received");
                    break;
                }
                // P1: a slice waited too long for an idle turn
                _ = sleep_until(force_deadline.unwrap_or_else(Instant::now)), if force_deadline.is_some() => {
                    trace!("scheduler slice forced");
                    self.engine.poll(false);
                }
                // P2: commands
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("all logger handles dropped");
                        break;
                    }
                },
                // P3: debounce expiry or idle slice
                _ = sleep_until(next_deadline.unwrap_or_else(Instant::now)), if next_deadline.is_some() => {
                    let host_idle = self.commands.is_empty();
                    self.engine.poll(host_idle);
                }
            }
        }

        while let Ok(command) = self.commands.try_recv() {
            self.handle_command(command);
        }
        self.replay_deferred();
        if !self.deferred.is_empty() {
            warn!("dropping {} settlements still waiting for a call span", self.deferred.len());
        }
        self.engine.drain();
        info!("logger runtime stopped");
        Ok(self.engine)
    }

    fn handle_command(
        &mut self,
        command: LoggerCommand,
    ) {
        if command.is_settlement() && self.engine.in_call() {
            trace!("deferring {} until the call span returns", command.name());
            self.deferred.push_back(command);
            return;
        }

        match command {
            LoggerCommand::EnterCall { descriptor, ack } => {
                let scope = self.engine.enter_call(descriptor);
                if let Err(scope) = ack.send(scope) {
                    // caller went away; keep the call depth balanced
                    debug!("enter_call caller dropped, closing its scope");
                    self.engine.exit_call(scope, None);
                    self.replay_deferred();
                }
            }
            LoggerCommand::ExitCall { scope, result } => {
                self.engine.exit_call(scope, result);
                self.replay_deferred();
            }
            LoggerCommand::Notify(notification) => self.engine.notify(notification),
            LoggerCommand::Settle { handle, outcome } => self.engine.settle(handle, outcome),
            LoggerCommand::Abort(handle) => self.engine.abort(handle),
            LoggerCommand::Flush => self.engine.flush(),
            LoggerCommand::Drain { ack } => {
                self.engine.drain();
                if ack.send(()).is_err() {
                    debug!("drain caller dropped");
                }
            }
        }
    }

    fn replay_deferred(&mut self) {
        if self.engine.in_call() {
            return;
        }
        while let Some(command) = self.deferred.pop_front() {
            match command {
                LoggerCommand::Settle { handle, outcome } => self.engine.settle(handle, outcome),
                LoggerCommand::Abort(handle) => self.engine.abort(handle),
                other => warn!("unexpected deferred command: {}", other.name()),
            }
        }
    }
}

//! Endpoint-local worker membership and the derived command table.
//!
//! Single-writer state folded from register/unregister events. Two
//! commands are always present and handled locally; everything else
//! maps a command key to some worker's request queue. Command key
//! collisions across workers are last-writer-wins.

use std::collections::HashMap;

use tracing::{info, warn};

use shunt_fabric::msg::MsgWorker;

pub const VERSION_COMMAND: &str = "version";
pub const HELP_COMMAND: &str = "help";

/// Where a command key routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTarget {
    /// Built-in: report the node version.
    Version,
    /// Built-in: render the command listing.
    Help,
    /// Forward to the worker queue at `path`.
    Worker { path: String },
}

impl CommandTarget {
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Worker { .. })
    }
}

/// The membership table plus its derived command table.
pub struct EndpointState {
    workers: HashMap<String, MsgWorker>,
    commands: HashMap<String, CommandTarget>,
}

impl EndpointState {
    pub fn new() -> Self {
        let mut commands = HashMap::new();
        commands.insert(VERSION_COMMAND.to_string(), CommandTarget::Version);
        commands.insert(HELP_COMMAND.to_string(), CommandTarget::Help);
        Self {
            workers: HashMap::new(),
            commands,
        }
    }

    /// Fold a register event: a re-registered name drops its previous
    /// commands before the new ones are installed.
    pub fn register_worker(&mut self, worker: MsgWorker) {
        if self.workers.contains_key(&worker.name) {
            warn!(worker = %worker.name, "overwrite and register a new worker");
            self.unregister_worker(&worker.name);
        } else {
            info!(worker = %worker.name, "register a new worker");
        }

        for cmd in &worker.cmds {
            self.commands.insert(
                cmd.key.clone(),
                CommandTarget::Worker {
                    path: worker.path.clone(),
                },
            );
        }
        self.workers.insert(worker.name.clone(), worker);
    }

    /// Fold an unregister event. Returns whether the name was known.
    pub fn unregister_worker(&mut self, name: &str) -> bool {
        let Some(worker) = self.workers.remove(name) else {
            return false;
        };
        self.commands.retain(|_, target| match target {
            CommandTarget::Worker { path } => *path != worker.path,
            _ => true,
        });
        true
    }

    pub fn target(&self, command: &str) -> Option<&CommandTarget> {
        self.commands.get(command)
    }

    pub fn workers(&self) -> impl Iterator<Item = &MsgWorker> {
        self.workers.values()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Built-in listing followed by every live worker's command lines.
    pub fn render_help(&self, prefix: &str) -> String {
        let mut buffer = String::from("Available commands:\n");
        buffer.push_str(&format!("{prefix}{VERSION_COMMAND} - Show version number\n"));
        buffer.push_str(&format!("{prefix}{HELP_COMMAND} - Show help message\n"));
        for worker in self.workers.values() {
            let help = worker.as_help(prefix);
            if !help.is_empty() {
                buffer.push_str(&help);
                buffer.push('\n');
            }
        }
        buffer.trim_end().to_string()
    }
}

impl Default for EndpointState {
    fn default() -> Self {
        Self::new()
    }
}

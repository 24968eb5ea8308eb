//! # Undo/Redo
//!
//! Linear command history for one presentation.
//!
//! ## Design
//!
//! - Executing a command records it together with its inverse
//! - Undo runs the inverse and moves the entry to the redo stack
//! - Redo runs the command again and moves it back
//! - Executing a new command clears the redo stack (no branching)
//! - Transactions group executed commands into one composite undo step

use crate::command::{Command, CompositeCommand, EditContext};
use crate::error::{ModelError, ModelResult};
use crate::events::DataModelEvent;
use crate::ids::{ChannelId, MediaDataId, NodeId};
use tracing::{debug, warn};

/// A command together with the command that reverts it.
#[derive(Debug, Clone)]
struct HistoryEntry {
    command: Command,
    inverse: Command,
}

impl HistoryEntry {
    fn description(&self) -> String {
        self.command.description()
    }
}

#[derive(Debug)]
struct Transaction {
    description: String,
    commands: Vec<Command>,
    /// Reverse application order.
    inverses: Vec<Command>,
}

#[derive(Debug, Default)]
pub struct UndoRedoManager {
    /// Most recent last
    undo_stack: Vec<HistoryEntry>,

    /// Most recent last
    redo_stack: Vec<HistoryEntry>,

    /// 0 = unlimited
    max_levels: usize,

    transaction: Option<Transaction>,
}

impl UndoRedoManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            max_levels,
            ..Self::default()
        }
    }

    /// Apply `command` and record it for undo.
    pub fn execute(&mut self, command: Command, ctx: &mut EditContext<'_>) -> ModelResult<()> {
        let inverse = ctx.run(&command)?;
        debug!(command = %command.description(), "executed command");

        if let Some(transaction) = &mut self.transaction {
            transaction.commands.push(command);
            transaction.inverses.insert(0, inverse);
            return Ok(());
        }

        let description = command.description();
        self.push_entry(HistoryEntry { command, inverse });
        ctx.events
            .notify(&DataModelEvent::CommandDone { description })
    }

    /// Start grouping executed commands into one undo step.
    pub fn start_transaction(&mut self, description: impl Into<String>) -> ModelResult<()> {
        if self.transaction.is_some() {
            return Err(ModelError::TransactionInProgress);
        }
        self.transaction = Some(Transaction {
            description: description.into(),
            commands: Vec::new(),
            inverses: Vec::new(),
        });
        Ok(())
    }

    /// Close the open transaction. An empty transaction records nothing.
    pub fn end_transaction(&mut self, ctx: &mut EditContext<'_>) -> ModelResult<()> {
        let transaction = self.transaction.take().ok_or(ModelError::NoTransaction)?;
        if transaction.commands.is_empty() {
            return Ok(());
        }

        let description = transaction.description;
        let command = CompositeCommand::from_parts(Some(description.clone()), transaction.commands);
        let inverse = CompositeCommand::from_parts(Some(description.clone()), transaction.inverses);
        self.push_entry(HistoryEntry {
            command: command.into(),
            inverse: inverse.into(),
        });
        ctx.events
            .notify(&DataModelEvent::CommandDone { description })
    }

    /// Revert everything executed since the transaction started and drop it.
    /// If a step fails, the transaction stays open holding only the commands
    /// that are still applied.
    pub fn cancel_transaction(&mut self, ctx: &mut EditContext<'_>) -> ModelResult<()> {
        let mut transaction = self.transaction.take().ok_or(ModelError::NoTransaction)?;
        while !transaction.inverses.is_empty() {
            let inverse = transaction.inverses.remove(0);
            if let Err(err) = ctx.run(&inverse) {
                warn!(transaction = %transaction.description, error = %err, "cancel failed");
                transaction.inverses.insert(0, inverse);
                self.transaction = Some(transaction);
                return Err(err);
            }
            transaction.commands.pop();
        }
        debug!(transaction = %transaction.description, "cancelled transaction");
        Ok(())
    }

    pub fn is_transaction_active(&self) -> bool {
        self.transaction.is_some()
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);
        self.trim();
        self.redo_stack.clear();
    }

    fn trim(&mut self) {
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            let excess = self.undo_stack.len() - self.max_levels;
            self.undo_stack.drain(..excess);
        }
    }

    /// Undo the most recent step. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self, ctx: &mut EditContext<'_>) -> ModelResult<bool> {
        if self.transaction.is_some() {
            return Err(ModelError::TransactionInProgress);
        }
        let Some(entry) = self.undo_stack.pop() else {
            return Ok(false);
        };

        if let Err(err) = ctx.run(&entry.inverse) {
            warn!(command = %entry.description(), error = %err, "undo failed");
            self.undo_stack.push(entry);
            return Err(err);
        }

        let description = entry.description();
        self.redo_stack.push(entry);
        ctx.events
            .notify(&DataModelEvent::CommandUndone { description })?;
        Ok(true)
    }

    /// Redo the most recently undone step. Returns `false` when there is
    /// nothing to redo.
    pub fn redo(&mut self, ctx: &mut EditContext<'_>) -> ModelResult<bool> {
        if self.transaction.is_some() {
            return Err(ModelError::TransactionInProgress);
        }
        let Some(mut entry) = self.redo_stack.pop() else {
            return Ok(false);
        };

        match ctx.run(&entry.command) {
            Ok(inverse) => entry.inverse = inverse,
            Err(err) => {
                warn!(command = %entry.description(), error = %err, "redo failed");
                self.redo_stack.push(entry);
                return Err(err);
            }
        }

        let description = entry.description();
        self.undo_stack.push(entry);
        ctx.events
            .notify(&DataModelEvent::CommandRedone { description })?;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.last().map(HistoryEntry::description)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(HistoryEntry::description)
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Limit the undo depth; the oldest steps are dropped first.
    pub fn set_max_levels(&mut self, max_levels: usize) {
        self.max_levels = max_levels;
        self.trim();
    }

    /// Forget all history. An open transaction is abandoned as applied.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.transaction = None;
    }

    fn commands(&self) -> impl Iterator<Item = &Command> {
        let entries = self
            .undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .flat_map(|e| [&e.command, &e.inverse]);
        let pending = self
            .transaction
            .iter()
            .flat_map(|t| t.commands.iter().chain(t.inverses.iter()));
        entries.chain(pending)
    }

    /// Media data that undoing or redoing could bring back into the tree.
    pub fn referenced_media_data(&self) -> Vec<MediaDataId> {
        let mut out = Vec::new();
        for command in self.commands() {
            command.collect_media_data(&mut out);
        }
        out.sort();
        out.dedup();
        out
    }

    /// Nodes that undoing or redoing could re-attach.
    pub fn referenced_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for command in self.commands() {
            command.collect_nodes(&mut out);
        }
        out.sort();
        out.dedup();
        out
    }

    /// Channels that undoing or redoing could map media through.
    pub fn referenced_channels(&self) -> Vec<ChannelId> {
        let mut out = Vec::new();
        for command in self.commands() {
            command.collect_channels(&mut out);
        }
        out.sort();
        out.dedup();
        out
    }
}

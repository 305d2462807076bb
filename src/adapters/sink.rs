//! Command publication, once per control tick.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::VelocityCommand;

pub trait CommandSink: Send {
    fn publish(&mut self, command: &VelocityCommand);
}

/// Keeps every published command; clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    commands: Arc<Mutex<Vec<VelocityCommand>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<VelocityCommand> {
        self.commands.lock().clone()
    }

    pub fn last(&self) -> Option<VelocityCommand> {
        self.commands.lock().last().copied()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CommandSink for RecordingSink {
    fn publish(&mut self, command: &VelocityCommand) {
        self.commands.lock().push(*command);
    }
}

/// Writes commands to the log at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl CommandSink for LogSink {
    fn publish(&mut self, command: &VelocityCommand) {
        tracing::debug!(
            vx = command.linear_x,
            vy = command.linear_y,
            wz = command.angular_z,
            "cmd_vel"
        );
    }
}

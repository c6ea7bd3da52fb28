//! Named tasks.
//!
//! Tasks are user-defined operations invoked by name instead of a target
//! build. Rule manifests declare them as argv vectors ([`CommandTask`]);
//! the platform registers the built-in [`CleanTask`] during init.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use enb_core::TaskConfig;

use crate::platform::MakePlatform;

/// Errors raised while running a task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task declaration has an empty argv.
    #[error("task command is empty")]
    EmptyCommand,

    /// The task process could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// The executable that failed to spawn.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The task process exited non-zero.
    #[error("command `{command}` exited with status {status}")]
    Failed {
        /// The executable that ran.
        command: String,
        /// Exit status (-1 when terminated by a signal).
        status: i32,
    },

    /// Any other failure, flattened.
    #[error("{0}")]
    Other(String),
}

/// A named task the platform can run.
#[async_trait]
pub trait Task: Send + Sync {
    /// Task name used for dispatch.
    fn name(&self) -> &str;

    /// Run the task. The returned value is forwarded to the caller.
    async fn run(&self, platform: &Arc<MakePlatform>, args: &[String]) -> Result<Value, TaskError>;
}

/// A manifest-declared task: an argv vector run with cwd = project dir.
/// Invocation arguments are appended to the declared ones.
pub struct CommandTask {
    name: String,
    command: Vec<String>,
}

impl CommandTask {
    /// Create a command task from its manifest declaration.
    pub fn new(name: &str, config: &TaskConfig) -> Self {
        Self {
            name: name.to_owned(),
            command: config.command.clone(),
        }
    }
}

#[async_trait]
impl Task for CommandTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, platform: &Arc<MakePlatform>, args: &[String]) -> Result<Value, TaskError> {
        let program = self.command.first().ok_or(TaskError::EmptyCommand)?;
        let status = tokio::process::Command::new(program)
            .args(&self.command[1..])
            .args(args)
            .current_dir(platform.dir())
            .status()
            .await
            .map_err(|source| TaskError::Spawn {
                command: program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(TaskError::Failed {
                command: program.clone(),
                status: status.code().unwrap_or(-1),
            });
        }
        Ok(json!({ "task": self.name, "status": 0 }))
    }
}

/// Built-in `clean` task: delegates to the platform's target cleaning.
pub struct CleanTask;

#[async_trait]
impl Task for CleanTask {
    fn name(&self) -> &str {
        "clean"
    }

    async fn run(&self, platform: &Arc<MakePlatform>, args: &[String]) -> Result<Value, TaskError> {
        platform
            .clean_targets(args)
            .await
            .map_err(|e| TaskError::Other(e.to_string()))?;
        Ok(Value::Null)
    }
}

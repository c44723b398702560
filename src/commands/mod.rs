//! Command handlers for the splitsync CLI, one module per subcommand.

mod attachments;
mod delete;
mod init;
mod refresh;
mod report;
mod search;
mod stage;
mod submit;

use crate::api::Mode;
use crate::mirror::Mirror;
use crate::outbox::{LogAttachmentSink, Outbox};
use crate::{Config, Result};
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

pub use attachments::attachments;
pub use delete::delete;
pub use init::init;
pub use refresh::refresh;
pub use report::report;
pub use search::search;
pub use stage::{stage, StagedLeg};
pub use submit::{pending, retry, submit, RetrySummary, SubmitSummary};

/// What a command hands back to `main`: a user-facing message about the outcome, plus
/// optional structured data for tests and machine consumers.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    message: String,
    structure: Option<T>,
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// An outcome carrying structured data.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// An outcome that is only a message.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Logs the message at info level and the structured data, when present, as
    /// pretty-printed JSON at debug level.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Wires up the read side of the engine for a command.
pub(crate) async fn mirror(config: &Config, mode: Mode) -> Result<Mirror> {
    let remote = crate::api::remote(config, mode).await?;
    Ok(Mirror::new(
        config.db().clone(),
        remote,
        config.delete_policy(),
    ))
}

/// Wires up the submission side of the engine for a command.
pub(crate) async fn outbox(config: &Config, mode: Mode) -> Result<Outbox> {
    let remote = crate::api::remote(config, mode).await?;
    Ok(Outbox::new(
        config.db().clone(),
        remote,
        Arc::new(LogAttachmentSink),
    ))
}

//! The `attachments` command: list a transaction's attachment rows.

use crate::api::Mode;
use crate::args::AttachmentsArgs;
use crate::commands::{mirror, Out};
use crate::model::AttachmentRecord;
use crate::{Config, Result};

pub async fn attachments(
    config: Config,
    mode: Mode,
    args: AttachmentsArgs,
) -> Result<Out<Vec<AttachmentRecord>>> {
    let mirror = mirror(&config, mode).await?;
    let rows = mirror.attachments(args.id()).await?;
    let message = match rows.len() {
        0 => format!("Transaction {} has no attachments", args.id()),
        1 => format!("Transaction {} has 1 attachment", args.id()),
        n => format!("Transaction {} has {n} attachments", args.id()),
    };
    Ok(Out::new(message, rows))
}

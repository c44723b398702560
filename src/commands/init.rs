//! The `init` command: create and initialize the data directory.

use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

pub async fn init(home: &Path, token_file: &Path, server_url: &str) -> Result<Out<String>> {
    let config = Config::create(home, token_file, server_url).await?;
    Ok(Out::new_message(format!(
        "Initialized splitsync data directory at '{}'",
        config.root().display()
    )))
}

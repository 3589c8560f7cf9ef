//! List command - print every asset of a repository.

use std::io::{self, Write};
use std::process::ExitCode;

use nexus_mirror::catalog::{CatalogClient, CatalogPages};
use nexus_mirror::transport::HttpSettings;
use tracing::error;

use super::common::ConnectionArgs;
use super::{EXIT_COMPLETE, EXIT_INCOMPLETE};
use crate::error::CliError;

/// Arguments for the list command.
#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Run the list command.
///
/// Prints `path<TAB>sha1` per asset; assets without a SHA-1 get an empty
/// second column.
pub fn run(args: Args) -> Result<ExitCode, CliError> {
    let config = args.connection.to_config()?;
    let client = HttpSettings::from_config(&config).build_client()?;
    let catalog = CatalogClient::new(
        client,
        config.base_url.clone(),
        config.repository.clone(),
        config.credentials.clone(),
    )?;

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    for page in CatalogPages::new(&catalog, None) {
        let page = match page {
            Ok(page) => page,
            Err(e) => {
                let _ = out.flush();
                error!(error = %e, "Error retrieving available assets");
                eprintln!("Listing stopped early: {}", e);
                return Ok(ExitCode::from(EXIT_INCOMPLETE));
            }
        };

        for asset in &page.items {
            let sha1 = asset.checksum.sha1.as_deref().unwrap_or("");
            if writeln!(out, "{}\t{}", asset.path, sha1).is_err() {
                // Downstream closed the pipe.
                return Ok(ExitCode::from(EXIT_COMPLETE));
            }
        }
    }

    let _ = out.flush();
    Ok(ExitCode::from(EXIT_COMPLETE))
}

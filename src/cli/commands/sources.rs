//! Discovery-only command.

use tokio::runtime::Runtime;

use crate::config::RunConfig;
use crate::sources::{Discovered, SourceEnumerator};
use crate::store::S3Store;

/// Print the sources the configured discovery mode finds
pub fn cmd_sources(rt: &Runtime, config: &RunConfig) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = S3Store::connect(&config.aws, &config.bucket).await?;
        let discovered = SourceEnumerator::new(config.discovery.clone())
            .enumerate(&store)
            .await?;

        match &discovered {
            Discovered::Remote(ids) => {
                for id in ids {
                    println!("{id}");
                }
            }
            Discovered::Cached(paths) => {
                for path in paths {
                    println!("{}", path.display());
                }
            }
        }
        println!("\n{} tracks ({})", discovered.len(), config.discovery.name());
        Ok(())
    })
}

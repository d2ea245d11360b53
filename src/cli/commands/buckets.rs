//! Bucket listing command.

use tokio::runtime::Runtime;

use crate::config::RunConfig;
use crate::store::S3Store;

/// Print every bucket the configured credentials can see
pub fn cmd_buckets(rt: &Runtime, config: &RunConfig) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = S3Store::connect(&config.aws, &config.bucket).await?;
        for name in store.list_buckets().await? {
            let marker = if name == config.bucket { " (configured)" } else { "" };
            println!("{name}{marker}");
        }
        Ok(())
    })
}

//! Migration command.

use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::config::RunConfig;
use crate::metadata::LoftyTagReader;
use crate::pipeline::{PipelineOptions, PublishPipeline};
use crate::store::S3Store;

/// Run the pipeline against the configured bucket
pub fn cmd_run(
    rt: &Runtime,
    config: &RunConfig,
    dry_run: bool,
    plan: Option<&PathBuf>,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = S3Store::connect(&config.aws, &config.bucket).await?;

        let options = PipelineOptions {
            dry_run,
            plan_path: plan.cloned(),
            ..PipelineOptions::from(config)
        };
        let summary = PublishPipeline::from_config(&store, config, LoftyTagReader)
            .with_options(options)
            .run()
            .await?;

        if dry_run {
            println!("\n[DRY RUN MODE - nothing was uploaded or deleted]");
        }
        println!(
            "\nCompleted: {} discovered, {} staged, {} resolved, {} skipped, {} published, {} deleted",
            summary.discovered,
            summary.staged,
            summary.resolved,
            summary.skipped,
            summary.published,
            summary.deleted
        );
        if summary.cache_purged {
            println!("Staging directory {:?} removed", config.staging_dir);
        }
        Ok(())
    })
}

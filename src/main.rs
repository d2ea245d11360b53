//! Sortie - re-paths audio files in an S3 bucket by their tags.
//!
//! Sources are discovered (from a manifest, a live bucket listing, or a
//! leftover staging directory), downloaded to a local staging cache, resolved
//! to a target key by rendering a path template over their artist/album/title
//! tags, and uploaded back to the same bucket. The originals can optionally be
//! deleted once their re-pathed copy is published.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod organizer;
pub mod pipeline;
pub mod sources;
pub mod staging;
pub mod store;
#[cfg(test)]
pub mod test_utils;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let args = cli::Cli::parse();

    match cli::run_command(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // No-op if the run already installed its subscriber
            logging::init_fallback();
            tracing::error!(target: logging::FATAL_TARGET, "{e:#}");
            if e
                .downcast_ref::<error::Error>()
                .is_some_and(error::Error::is_permission_denied)
            {
                tracing::error!(
                    target: logging::FATAL_TARGET,
                    "Check that the configured AWS profile may access the bucket"
                );
            }
            ExitCode::FAILURE
        }
    }
}

//! The migration run.
//!
//! Phases execute strictly in order and never loop back:
//!
//! ```text
//! ENUMERATE -> STAGE -> RESOLVE -> PUBLISH -> CLEAN_SOURCES -> PURGE_CACHE -> DONE
//! ```
//!
//! - STAGE is skipped for cache-recovery runs
//! - RESOLVE re-walks the staging directory rather than trusting what was
//!   just downloaded, so a cache-recovery run and a fresh run resolve the
//!   same way
//! - CLEAN_SOURCES only runs with `clean_up` set, never in cache-recovery
//!   mode, and only deletes keys whose staged copy was published. A key that
//!   is itself a publish target of the run is never deleted.
//! - PURGE_CACHE only runs without `persistent_cache`
//!
//! The first error aborts the run. There is no rollback: uploads that
//! finished before a failure stay in the bucket.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::instrument;

use crate::config::{MetadataErrorPolicy, RunConfig};
use crate::error::{Error, Result, ResultExt};
use crate::metadata::TagReader;
use crate::organizer::{PathResolver, ResolvedTrack, RunPlan};
use crate::sources::{Discovered, SourceEnumerator, SourceId};
use crate::staging::{StagedFile, StagingCache};
use crate::store::ObjectStore;

/// Switches that shape a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Delete originals after a successful publish.
    pub clean_up: bool,
    /// Leave the staging directory in place at the end.
    pub persistent_cache: bool,
    pub on_metadata_error: MetadataErrorPolicy,
    /// Stop after RESOLVE: nothing is uploaded, deleted or purged.
    pub dry_run: bool,
    /// Write the resolved plan here after RESOLVE.
    pub plan_path: Option<PathBuf>,
}

impl From<&RunConfig> for PipelineOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            clean_up: config.clean_up,
            persistent_cache: config.persistent_cache,
            on_metadata_error: config.on_metadata_error,
            dry_run: false,
            plan_path: None,
        }
    }
}

/// Counts reported by a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub staged: usize,
    pub resolved: usize,
    pub skipped: usize,
    pub published: usize,
    pub deleted: usize,
    pub cache_purged: bool,
}

/// Orchestrates one run against a store.
pub struct PublishPipeline<'a, S: ?Sized, R> {
    store: &'a S,
    enumerator: SourceEnumerator,
    cache: StagingCache,
    resolver: PathResolver<R>,
    options: PipelineOptions,
}

impl<'a, S, R> PublishPipeline<'a, S, R>
where
    S: ObjectStore + ?Sized,
    R: TagReader,
{
    pub fn new(
        store: &'a S,
        enumerator: SourceEnumerator,
        cache: StagingCache,
        resolver: PathResolver<R>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            enumerator,
            cache,
            resolver,
            options,
        }
    }

    /// Build a pipeline from a validated configuration.
    pub fn from_config(store: &'a S, config: &RunConfig, reader: R) -> Self {
        Self::new(
            store,
            SourceEnumerator::new(config.discovery.clone()),
            StagingCache::new(&config.staging_dir),
            PathResolver::new(reader, config.template.clone()),
            PipelineOptions::from(config),
        )
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run every phase to completion.
    #[instrument(
        target = "sortie::pipeline",
        name = "run",
        skip(self),
        fields(bucket = self.store.bucket(), mode = self.enumerator.mode().name())
    )]
    pub async fn run(&self) -> Result<RunSummary> {
        tracing::info!(target: "sortie::pipeline", "New run started");
        let mut summary = RunSummary::default();

        let discovered = self.enumerate().await?;
        summary.discovered = discovered.len();
        if discovered.is_empty() {
            tracing::warn!(target: "sortie::pipeline", "No tracks discovered");
        }

        let sources = match discovered {
            Discovered::Remote(ids) => ids,
            Discovered::Cached(_) => Vec::new(),
        };
        let origins = self.stage(&sources).await?;
        summary.staged = origins.len();

        let (tracks, skipped) = self.resolve(&origins)?;
        summary.resolved = tracks.len();
        summary.skipped = skipped;

        let plan = RunPlan::new(self.resolver.template(), &tracks);
        if let Some(path) = &self.options.plan_path {
            plan.save(path)?;
            tracing::info!(target: "sortie::pipeline", path = %path.display(), "Plan written");
        }

        if self.options.dry_run {
            for (local_path, target_path) in plan.targets() {
                tracing::info!(
                    target: "sortie::pipeline",
                    "Would upload '{}' to '{}'",
                    local_path.display(),
                    target_path
                );
            }
            tracing::info!(target: "sortie::pipeline", "Dry run completed");
            return Ok(summary);
        }

        summary.published = self.publish(&tracks).await?;

        if self.should_clean_sources() {
            summary.deleted = self.clean_sources(&sources, &tracks).await?;
        }

        if !self.options.persistent_cache {
            self.cache.purge().with_context("purging staging directory")?;
            summary.cache_purged = true;
        }

        tracing::info!(target: "sortie::pipeline", ?summary, "Run completed");
        Ok(summary)
    }

    /// ENUMERATE: find the sources for this run.
    pub async fn enumerate(&self) -> Result<Discovered> {
        self.enumerator.enumerate(self.store).await
    }

    /// STAGE: download every source under its deterministic name.
    ///
    /// Returns the local path each source was staged at. Any failed download
    /// aborts the run.
    pub async fn stage(&self, sources: &[SourceId]) -> Result<HashMap<PathBuf, SourceId>> {
        let mut origins = HashMap::with_capacity(sources.len());
        if sources.is_empty() {
            return Ok(origins);
        }

        self.cache
            .ensure_dir()
            .with_context("preparing staging directory")?;
        tracing::info!(target: "sortie::pipeline", count = sources.len(), "Staging tracks");
        for source in sources {
            let destination = self.cache.stage_path_for(source);
            self.store.download(source, &destination).await?;
            origins.insert(destination, source.clone());
        }
        Ok(origins)
    }

    /// RESOLVE: walk the staging directory and compute every target path.
    ///
    /// Returns the resolved tracks and the number skipped for unreadable
    /// tags (only non-zero under [`MetadataErrorPolicy::Skip`]).
    pub fn resolve(
        &self,
        origins: &HashMap<PathBuf, SourceId>,
    ) -> Result<(Vec<ResolvedTrack>, usize)> {
        let staged = self.cache.list_staged()?;
        let mut tracks = Vec::with_capacity(staged.len());
        let mut skipped = 0;

        for local_path in staged {
            tracing::info!(target: "sortie::pipeline", "Cache found: {}", local_path.display());
            let file = StagedFile {
                origin: origins.get(&local_path).cloned(),
                local_path,
            };
            match self.resolver.resolve(file) {
                Ok(track) => tracks.push(track),
                Err(e @ Error::MetadataExtraction { .. })
                    if self.options.on_metadata_error == MetadataErrorPolicy::Skip =>
                {
                    tracing::warn!(target: "sortie::pipeline", error = %e, "Skipping track");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok((tracks, skipped))
    }

    /// PUBLISH: upload every resolved track to its target path.
    pub async fn publish(&self, tracks: &[ResolvedTrack]) -> Result<usize> {
        for (published, track) in tracks.iter().enumerate() {
            if let Err(e) = self
                .store
                .upload(&track.staged.local_path, &track.target_path)
                .await
            {
                tracing::warn!(
                    target: "sortie::pipeline",
                    published,
                    remaining = tracks.len() - published,
                    "Publish aborted; earlier uploads remain in the bucket"
                );
                return Err(e);
            }
        }
        Ok(tracks.len())
    }

    fn should_clean_sources(&self) -> bool {
        self.options.clean_up && !self.enumerator.mode().is_cache_recovery()
    }

    /// CLEAN_SOURCES: delete the originals that were downloaded and
    /// re-published in this run, in discovery order.
    ///
    /// A source whose key is also a target of this run already sits at its
    /// sorted location and is kept.
    pub async fn clean_sources(
        &self,
        sources: &[SourceId],
        published: &[ResolvedTrack],
    ) -> Result<usize> {
        let republished: HashSet<&SourceId> = published
            .iter()
            .filter_map(|t| t.staged.origin.as_ref())
            .collect();
        let targets: HashSet<&str> = published.iter().map(|t| t.target_path.as_str()).collect();

        let mut deleted = 0;
        for source in sources.iter().filter(|s| republished.contains(s)) {
            if targets.contains(source.as_str()) {
                tracing::warn!(
                    target: "sortie::pipeline",
                    "Keeping '{}': it is the published target of this run",
                    source
                );
                continue;
            }
            self.store.delete(source).await?;
            deleted += 1;
        }
        Ok(deleted)
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! RPM package acquisition.

This crate implements the package acquisition engine of an OS image
composer: given a list of requested package names and a set of RPM
repositories, it discovers every available package, selects a concrete
package per request, computes the transitive dependency closure,
downloads the resulting artifact set concurrently, and verifies every
artifact cryptographically before declaring success.

The stages are usable on their own:

* [metadata] fetches and parses `repomd.xml` and the primary metadata
  artifact into flat [descriptor::PackageDescriptor] records.
* [package_version] implements version parsing, total ordering, and
  constraint satisfaction.
* [resolver] matches requested names against the catalog and computes
  a deterministic, conflict-checked dependency closure. The rewritten
  dependency graph can be rendered as DOT via [resolver::graph].
* [fetch] downloads a URL set into an idempotent flat cache with
  bounded concurrency and cancellation.
* [verify] checks OpenPGP signatures and payload digests of downloaded
  artifacts in parallel.

[acquire] chains the stages. Progress flows through the caller's
[ProgressReporter]; cancellation through a
[tokio_util::sync::CancellationToken]. Terminal UI, configuration
loading, and manifest serialization are the embedding application's
concern.
*/

pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod http;
pub mod io;
pub mod metadata;
pub mod package_version;
pub mod progress;
pub mod resolver;
pub mod verify;

pub use crate::{
    descriptor::{PackageDescriptor, RepositoryConfig},
    error::{AcquireError, Result},
    package_version::PackageVersion,
    progress::ProgressReporter,
    resolver::{Catalog, ResolvedPackage, ResolvedSet},
    verify::VerificationOutcome,
};

use {log::warn, std::path::PathBuf, tokio_util::sync::CancellationToken};

/// Everything needed to drive one acquisition run.
#[derive(Clone, Debug)]
pub struct AcquireRequest {
    /// Repositories to read: the base repository first, then user
    /// repositories in order.
    pub repositories: Vec<RepositoryConfig>,

    /// Requested package names.
    pub packages: Vec<String>,

    /// Directory receiving downloaded artifacts, one file per URL
    /// basename.
    pub cache_dir: PathBuf,

    /// Concurrent workers for fetching and verification.
    pub workers: usize,

    /// Prefer candidates whose release carries this tag.
    pub distribution_tag: Option<String>,

    /// Public key files used to verify downloaded artifacts.
    pub keyrings: Vec<PathBuf>,

    /// Optional path receiving the dependency graph in DOT syntax.
    pub dot_path: Option<PathBuf>,
}

/// Acquire the requested packages: parse, resolve, fetch, verify.
///
/// Returns the resolved set only once every downloaded artifact passed
/// verification (or came from a repository that does not require it).
/// All failures are terminal; no partial set is returned.
pub async fn acquire(
    request: &AcquireRequest,
    progress: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<ResolvedSet> {
    let client = http::build_client()?;

    progress.status("reading repository metadata");

    let enabled: Vec<&RepositoryConfig> = request
        .repositories
        .iter()
        .filter(|repo| repo.enabled)
        .collect();

    let parsed = futures::future::try_join_all(
        enabled
            .iter()
            .map(|config| metadata::parse_repository(&client, config)),
    )
    .await?;

    let catalog = Catalog::new(parsed.into_iter().flatten().collect());

    progress.status("resolving dependencies");

    let seeds = resolver::matcher::match_requested(
        &catalog,
        &request.packages,
        request.distribution_tag.as_deref(),
    )?;
    let resolved = resolver::resolve(&catalog, &seeds)?;

    if let Some(path) = &request.dot_path {
        resolver::graph::write_dot(&resolved, path)?;
    }

    progress.status(&format!("fetching {} packages", resolved.len()));

    let urls = resolved.urls();
    fetch::fetch_urls(
        &client,
        &urls,
        &request.cache_dir,
        request.workers,
        progress,
        cancel,
    )
    .await?;

    progress.status("verifying signatures");

    let paths: Vec<PathBuf> = urls
        .iter()
        .map(|url| request.cache_dir.join(fetch::url_basename(url)))
        .collect();

    let outcomes =
        verify::verify_artifacts(&paths, &request.keyrings, request.workers, progress).await?;

    let mut failed = vec![];
    for outcome in &outcomes {
        if outcome.ok {
            continue;
        }

        let file_name = outcome
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match resolved.iter().find(|p| p.descriptor.file_name() == file_name) {
            Some(package) if !verification_required(&request.repositories, &package.descriptor) => {
                warn!(
                    "accepting unverified package {}: repository does not require signatures",
                    package.descriptor.name
                );
            }
            Some(package) => failed.push(package.descriptor.name.clone()),
            None => failed.push(file_name),
        }
    }

    if !failed.is_empty() {
        return Err(AcquireError::VerificationFailed { packages: failed });
    }

    Ok(resolved)
}

/// Whether the repository a descriptor came from requires signature
/// verification. Packages not attributable to any configured
/// repository always require it.
fn verification_required(repositories: &[RepositoryConfig], descriptor: &PackageDescriptor) -> bool {
    for repo in repositories {
        let prefix = format!("{}/", repo.base_url.trim_end_matches('/'));
        if descriptor.url.starts_with(&prefix) {
            return repo.gpg_required;
        }
    }

    true
}

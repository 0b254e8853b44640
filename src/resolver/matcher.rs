// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Requested-name matching.

Maps the names a user asked for onto concrete catalog descriptors. A
request is tried as an exact package name, then as an artifact
filename, then as the package-name prefix of an artifact filename.
Source artifacts never reach the catalog, so they cannot match.
*/

use {
    crate::{
        descriptor::PackageDescriptor,
        error::{AcquireError, Result},
        resolver::Catalog,
    },
    log::debug,
};

/// Match every requested name to one descriptor.
///
/// Fails with [AcquireError::PackageNotFound] on the first name with no
/// candidate.
pub fn match_requested(
    catalog: &Catalog,
    requested: &[String],
    distribution_tag: Option<&str>,
) -> Result<Vec<PackageDescriptor>> {
    requested
        .iter()
        .map(|name| match_one(catalog, name, distribution_tag))
        .collect()
}

fn match_one(
    catalog: &Catalog,
    name: &str,
    distribution_tag: Option<&str>,
) -> Result<PackageDescriptor> {
    if let Some(found) = lookup(catalog, catalog.by_name.get(name), distribution_tag) {
        return Ok(found);
    }

    // Filename match: NAME.TYPE, e.g. `curl-8.8.0-2.azl3.x86_64.rpm`
    // requested without its directory.
    for package_type in &catalog.package_types {
        let file_name = format!("{}.{}", name, package_type);
        if let Some(found) = lookup(catalog, catalog.by_file_name.get(&file_name), distribution_tag)
        {
            debug!("request {} matched by filename", name);
            return Ok(found);
        }
    }

    if let Some(found) = lookup(catalog, catalog.by_file_base.get(name), distribution_tag) {
        debug!("request {} matched by filename base name", name);
        return Ok(found);
    }

    Err(AcquireError::PackageNotFound(name.to_string()))
}

fn lookup(
    catalog: &Catalog,
    indices: Option<&Vec<usize>>,
    distribution_tag: Option<&str>,
) -> Option<PackageDescriptor> {
    let mut candidates = catalog.descriptors_at(indices?);

    // Prefer candidates whose release carries the distribution tag,
    // falling back to the full list when none do.
    if let Some(tag) = distribution_tag {
        let tagged: Vec<_> = candidates
            .iter()
            .copied()
            .filter(|d| d.parsed_version().release().ends_with(tag))
            .collect();

        if !tagged.is_empty() {
            candidates = tagged;
        }
    }

    candidates.sort_by(|a, b| b.parsed_version().cmp(&a.parsed_version()));

    candidates.first().map(|d| (*d).clone())
}

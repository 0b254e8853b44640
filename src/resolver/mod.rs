// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Dependency resolution.

[Catalog] indexes every descriptor parsed from the configured
repositories. [resolve] walks the requires→provides relation breadth
first from a set of seed packages and produces a [ResolvedSet]: a
deterministic, closed set of descriptors whose requirements have been
rewritten to the concrete package names chosen to satisfy them.

Candidate selection prefers packages from the same repository as the
requiring package, falling back to the highest-versioned candidate from
anywhere. This is not a constraint solver: the first viable choice
wins, and incompatible choices reached later fail the resolution.
*/

pub mod graph;
pub mod matcher;

use {
    crate::{
        dependency::{requirement_base, VersionConstraint},
        descriptor::PackageDescriptor,
        error::{AcquireError, Result},
    },
    log::debug,
    std::collections::{HashMap, HashSet, VecDeque},
};

/// An indexed set of package descriptors from all configured repositories.
///
/// Construction order is significant: descriptors from the base
/// repository come first, then user repositories in configuration
/// order. Ties during selection preserve that order.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    descriptors: Vec<PackageDescriptor>,

    /// Codec tags present in this catalog, e.g. `rpm`.
    package_types: HashSet<String>,

    by_name: HashMap<String, Vec<usize>>,
    by_file_name: HashMap<String, Vec<usize>>,
    by_file_base: HashMap<String, Vec<usize>>,
    by_provides: HashMap<String, Vec<usize>>,
    by_file: HashMap<String, Vec<usize>>,
}

impl Catalog {
    /// Index a sequence of descriptors.
    ///
    /// Descriptors sharing a URL with an earlier one are duplicates
    /// and are dropped.
    pub fn new(descriptors: Vec<PackageDescriptor>) -> Self {
        let mut catalog = Self::default();
        let mut seen_urls = HashSet::new();

        for descriptor in descriptors {
            if !seen_urls.insert(descriptor.url.clone()) {
                continue;
            }

            let index = catalog.descriptors.len();

            catalog.package_types.insert(descriptor.package_type.clone());

            catalog
                .by_name
                .entry(descriptor.name.clone())
                .or_default()
                .push(index);
            catalog
                .by_file_name
                .entry(descriptor.file_name().to_string())
                .or_default()
                .push(index);
            catalog
                .by_file_base
                .entry(descriptor.file_base_name())
                .or_default()
                .push(index);

            for capability in &descriptor.provides {
                catalog
                    .by_provides
                    .entry(capability.clone())
                    .or_default()
                    .push(index);
            }

            for file in &descriptor.files {
                catalog
                    .by_file
                    .entry(file.clone())
                    .or_default()
                    .push(index);
            }

            catalog.descriptors.push(descriptor);
        }

        catalog
    }

    /// Number of descriptors in the catalog.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the catalog holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Iterate over descriptors in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &PackageDescriptor> {
        self.descriptors.iter()
    }

    /// Whether any descriptor carries this exact name.
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    fn descriptors_at<'a>(&'a self, indices: &[usize]) -> Vec<&'a PackageDescriptor> {
        indices.iter().map(|&i| &self.descriptors[i]).collect()
    }

    /// Enumerate candidates able to satisfy a requirement base name, in
    /// precedence order: filename base name, then provides entries,
    /// then installed files. The result is sorted for selection.
    fn requirement_candidates(&self, base: &str) -> Vec<&PackageDescriptor> {
        let mut indices: Vec<usize> = vec![];

        for map in [&self.by_file_base, &self.by_provides, &self.by_file] {
            if let Some(list) = map.get(base) {
                for &index in list {
                    if !indices.contains(&index) {
                        indices.push(index);
                    }
                }
            }
        }

        let mut candidates = self.descriptors_at(&indices);
        sort_candidates(&mut candidates);
        candidates
    }
}

/// Order candidates by version descending. Among equal versions, a
/// provider that itself declares requirements outranks one that
/// declares none; remaining ties keep catalog order.
fn sort_candidates(candidates: &mut [&PackageDescriptor]) {
    candidates.sort_by(|a, b| {
        b.parsed_version().cmp(&a.parsed_version()).then_with(|| {
            let a_has_requirements = !a.requires.is_empty();
            let b_has_requirements = !b.requires.is_empty();
            b_has_requirements.cmp(&a_has_requirements)
        })
    });
}

/// A descriptor chosen for installation, with its requirements
/// rewritten to the names of the packages chosen to satisfy them.
#[derive(Clone, Debug)]
pub struct ResolvedPackage {
    pub descriptor: PackageDescriptor,

    /// Names of packages within the same resolved set.
    pub requires: Vec<String>,
}

/// The closed, deterministically ordered output of a resolution.
#[derive(Clone, Debug, Default)]
pub struct ResolvedSet {
    packages: Vec<ResolvedPackage>,
}

impl ResolvedSet {
    /// Number of resolved packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Iterate in output order: name ascending, ties by version
    /// descending then URL.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedPackage> {
        self.packages.iter()
    }

    /// Package names in output order.
    pub fn names(&self) -> Vec<&str> {
        self.packages
            .iter()
            .map(|p| p.descriptor.name.as_str())
            .collect()
    }

    /// Look up a resolved package by name.
    pub fn get(&self, name: &str) -> Option<&ResolvedPackage> {
        self.packages.iter().find(|p| p.descriptor.name == name)
    }

    /// Unique fetch URLs in output order.
    pub fn urls(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.packages
            .iter()
            .filter(|p| seen.insert(p.descriptor.url.clone()))
            .map(|p| p.descriptor.url.clone())
            .collect()
    }
}

/// Compute the transitive dependency closure of the seed packages.
///
/// Fails without a partial result on the first unsatisfiable or
/// conflicting requirement.
pub fn resolve(catalog: &Catalog, seeds: &[PackageDescriptor]) -> Result<ResolvedSet> {
    for seed in seeds {
        if !catalog.contains_name(&seed.name) {
            return Err(AcquireError::SeedMissing(seed.name.clone()));
        }
    }

    // Insertion-ordered accumulator. Keyed by name: a package already
    // chosen terminates traversal, which is also what tolerates
    // dependency cycles.
    let mut chosen: Vec<ResolvedPackage> = vec![];
    let mut chosen_names: HashMap<String, usize> = HashMap::new();

    let mut queue: VecDeque<PackageDescriptor> = seeds.iter().cloned().collect();

    while let Some(current) = queue.pop_front() {
        if chosen_names.contains_key(&current.name) {
            continue;
        }

        let slot = chosen.len();
        chosen_names.insert(current.name.clone(), slot);
        chosen.push(ResolvedPackage {
            descriptor: current.clone(),
            requires: vec![],
        });

        let mut rewritten: Vec<String> = vec![];

        for (dependency_name, requirement) in current.requirements()? {
            let base = requirement_base(&dependency_name).to_string();
            if base.is_empty() {
                continue;
            }

            // A package already in the set that covers this capability
            // is reused, provided it doesn't violate the version bound.
            if let Some(existing) = chosen
                .iter()
                .find(|p| p.descriptor.satisfies_capability(&base))
            {
                if let Some(constraint) = &requirement.constraint {
                    if !constraint.satisfied_by(&existing.descriptor.parsed_version()) {
                        return Err(AcquireError::ConflictingDependency {
                            package: current.name.clone(),
                            requirement: base,
                            constraint: constraint.to_string(),
                            chosen: format!(
                                "{} {}",
                                existing.descriptor.name, existing.descriptor.version
                            ),
                        });
                    }
                }

                push_unique(&mut rewritten, existing.descriptor.name.clone());
                continue;
            }

            let candidates = catalog.requirement_candidates(&base);
            if candidates.is_empty() {
                return Err(AcquireError::UnsatisfiedDependency {
                    package: current.name.clone(),
                    requirement: base,
                });
            }

            let selected =
                match select_candidate(&current, &candidates, requirement.constraint.as_ref()) {
                    Some(selected) => selected,
                    None => {
                        return Err(AcquireError::VersionConstraintUnsat {
                            package: current.name.clone(),
                            requirement: base,
                            constraint: requirement
                                .constraint
                                .map(|c| c.to_string())
                                .unwrap_or_default(),
                        })
                    }
                };

            debug!(
                "{} requires {}: selected {} {}",
                current.name, base, selected.name, selected.version
            );

            push_unique(&mut rewritten, selected.name.clone());
            queue.push_back(selected.clone());
        }

        chosen[slot].requires = rewritten;
    }

    chosen.sort_by(|a, b| {
        a.descriptor
            .name
            .cmp(&b.descriptor.name)
            .then_with(|| b.descriptor.parsed_version().cmp(&a.descriptor.parsed_version()))
            .then_with(|| a.descriptor.url.cmp(&b.descriptor.url))
    });

    Ok(ResolvedSet { packages: chosen })
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !names.contains(&name) {
        names.push(name);
    }
}

/// Pick one candidate for a requirement of `parent`.
///
/// With a version constraint: the first same-repository candidate
/// satisfying it, else the first satisfying candidate from another
/// repository, else `None`. Without a constraint: the
/// highest-versioned same-repository candidate, else the first
/// candidate outright.
fn select_candidate<'a>(
    parent: &PackageDescriptor,
    candidates: &[&'a PackageDescriptor],
    constraint: Option<&VersionConstraint>,
) -> Option<&'a PackageDescriptor> {
    let parent_repo = parent.repo_base();

    match constraint {
        Some(constraint) => candidates
            .iter()
            .find(|d| d.repo_base() == parent_repo && constraint.satisfied_by(&d.parsed_version()))
            .or_else(|| {
                candidates.iter().find(|d| {
                    d.repo_base() != parent_repo && constraint.satisfied_by(&d.parsed_version())
                })
            })
            .copied(),
        None => candidates
            .iter()
            .find(|d| d.repo_base() == parent_repo)
            .or_else(|| candidates.first())
            .copied(),
    }
}

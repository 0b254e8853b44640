// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package and repository descriptions.

[PackageDescriptor] is the codec-agnostic record the metadata parsers
emit, one per concrete package artifact. Descriptors are immutable once
emitted; resolution builds new records referencing them rather than
mutating their capability fields.
*/

use {
    crate::{
        dependency::Requirement,
        error::Result,
        package_version::PackageVersion,
    },
    serde::{Deserialize, Serialize},
    std::collections::BTreeSet,
};

/// Checksum algorithms SPDX consumers accept.
pub const SPDX_CHECKSUM_ALGORITHMS: &[&str] = &["SHA1", "SHA256", "MD5"];

/// Describes one package repository to read.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RepositoryConfig {
    /// Stable identifier for the repository.
    pub id: String,

    /// Human readable name.
    pub display_name: String,

    /// Base URL under which artifacts and metadata live.
    pub base_url: String,

    /// Relative path of the repository index. Defaults to
    /// `repodata/repomd.xml` when absent.
    pub metadata_href: Option<String>,

    /// Where the repository's signing key can be obtained.
    pub gpg_key_url: Option<String>,

    /// Whether artifacts from this repository must verify.
    pub gpg_required: bool,

    /// Disabled repositories are skipped entirely.
    pub enabled: bool,

    /// Distribution codename, for codecs that need one.
    pub codename: Option<String>,
}

/// A single concrete package artifact advertised by a repository.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PackageDescriptor {
    /// Canonical package name.
    pub name: String,

    /// Codec tag. `rpm` for now; `deb` and `apk` are reserved.
    #[serde(rename = "type")]
    pub package_type: String,

    /// Fully qualified `EPOCH:UPSTREAM-RELEASE` version.
    pub version: String,

    /// Machine architecture tag.
    pub arch: String,

    /// Absolute fetch URL. Unique per descriptor within one resolution.
    pub url: String,

    /// Longer text description. May be empty.
    pub description: String,

    /// License expression. May be empty.
    pub license: String,

    /// Supplying entity. May be empty.
    pub origin: String,

    /// Capabilities this package exports. Always contains [Self::name].
    pub provides: BTreeSet<String>,

    /// Capability names this package depends on.
    pub requires: Vec<String>,

    /// Requirement expressions aligned 1:1 with [Self::requires].
    pub requires_ver: Vec<String>,

    /// `(ALGORITHM, hex value)` pairs, algorithms uppercase.
    pub checksums: BTreeSet<(String, String)>,

    /// Paths this package installs.
    pub files: Vec<String>,
}

impl PackageDescriptor {
    /// The parsed form of [Self::version].
    pub fn parsed_version(&self) -> PackageVersion {
        PackageVersion::parse(&self.version)
    }

    /// Basename of the fetch URL.
    pub fn file_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or("")
    }

    /// Package-name prefix of the artifact filename.
    pub fn file_base_name(&self) -> String {
        file_base_name(self.file_name())
    }

    /// URL prefix grouping artifacts by originating repository.
    pub fn repo_base(&self) -> &str {
        repo_base_of(&self.url)
    }

    /// Requirement pairs from [Self::requires] and [Self::requires_ver].
    pub fn requirements(&self) -> Result<Vec<(String, Requirement)>> {
        self.requires
            .iter()
            .zip(self.requires_ver.iter())
            .map(|(name, expression)| Ok((name.clone(), Requirement::parse(expression)?)))
            .collect()
    }

    /// Whether this package satisfies a capability by name, provides
    /// entry, or installed file.
    pub fn satisfies_capability(&self, capability: &str) -> bool {
        self.name == capability
            || self.provides.contains(capability)
            || self.files.iter().any(|f| f == capability)
    }

    /// Checksums restricted to the algorithms SPDX consumers accept.
    pub fn spdx_checksums(&self) -> impl Iterator<Item = &(String, String)> + '_ {
        self.checksums
            .iter()
            .filter(|(algorithm, _)| SPDX_CHECKSUM_ALGORITHMS.contains(&algorithm.as_str()))
    }
}

/// Package-name prefix of an artifact filename: the dash-separated
/// segments before the first segment that begins with a decimal digit.
pub(crate) fn file_base_name(file_name: &str) -> String {
    let mut kept = vec![];

    for segment in file_name.split('-') {
        if segment
            .chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
        {
            break;
        }

        kept.push(segment);
    }

    kept.join("-")
}

/// URL prefix used to group artifacts by origin.
pub(crate) fn repo_base_of(url: &str) -> &str {
    for marker in ["/pool/", "/Packages/"] {
        if let Some(pos) = url.find(marker) {
            return &url[..pos + marker.len()];
        }
    }

    match url.rfind('/') {
        Some(pos) => &url[..pos + 1],
        None => url,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn descriptor(name: &str, version: &str, url: &str) -> PackageDescriptor {
        PackageDescriptor {
            name: name.to_string(),
            package_type: "rpm".to_string(),
            version: version.to_string(),
            arch: "x86_64".to_string(),
            url: url.to_string(),
            description: String::new(),
            license: String::new(),
            origin: String::new(),
            provides: [name.to_string()].into_iter().collect(),
            requires: vec![],
            requires_ver: vec![],
            checksums: BTreeSet::new(),
            files: vec![],
        }
    }

    #[test]
    fn file_base_name_extraction() {
        assert_eq!(file_base_name("curl-8.8.0-2.azl3.x86_64.rpm"), "curl");
        assert_eq!(
            file_base_name("curl-devel-8.8.0-1.azl3.x86_64.rpm"),
            "curl-devel"
        );
        assert_eq!(
            file_base_name("python3-some-package-1.2.3-4.el8.noarch.rpm"),
            "python3-some-package"
        );
    }

    #[test]
    fn repo_base_extraction() {
        assert_eq!(
            repo_base_of("https://example.com/repo/pool/main/c/curl-1.rpm"),
            "https://example.com/repo/pool/"
        );
        assert_eq!(
            repo_base_of("https://example.com/repo/Packages/c/curl-1.rpm"),
            "https://example.com/repo/Packages/"
        );
        assert_eq!(
            repo_base_of("https://example.com/other/curl-1.rpm"),
            "https://example.com/other/"
        );
    }

    #[test]
    fn capability_satisfaction() {
        let mut d = descriptor("glibc", "0:2.38-1", "https://example.com/r/glibc-2.38-1.rpm");
        d.provides.insert("libc.so.6".to_string());
        d.files.push("/usr/lib64/libc.so.6".to_string());

        assert!(d.satisfies_capability("glibc"));
        assert!(d.satisfies_capability("libc.so.6"));
        assert!(d.satisfies_capability("/usr/lib64/libc.so.6"));
        assert!(!d.satisfies_capability("libm.so.6"));
    }

    #[test]
    fn spdx_checksum_filtering() {
        let mut d = descriptor("x", "1", "https://example.com/r/x-1.rpm");
        d.checksums.insert(("SHA256".to_string(), "aa".to_string()));
        d.checksums.insert(("SHA512".to_string(), "bb".to_string()));

        let kept: Vec<_> = d.spdx_checksums().collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0, "SHA256");
    }

    #[test]
    fn requirements_align() {
        let mut d = descriptor("a", "1", "https://example.com/r/a-1.rpm");
        d.requires = vec!["b".to_string(), "c".to_string()];
        d.requires_ver = vec!["b (>= 2.0)".to_string(), "c".to_string()];

        let requirements = d.requirements().unwrap();
        assert_eq!(requirements.len(), 2);
        assert!(requirements[0].1.constraint.is_some());
        assert!(requirements[1].1.constraint.is_none());
    }
}

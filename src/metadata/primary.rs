// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `primary.xml` file format.

The primary metadata document lists every package in a repository. Only
the elements feeding [crate::descriptor::PackageDescriptor] are modeled;
unknown elements are skipped by the deserializer.
*/

use {
    crate::{error::Result, metadata::repomd::Location},
    serde::{Deserialize, Serialize},
    std::io::Read,
};

/// A parsed `primary.xml` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primary {
    /// The number of packages the document claims to express.
    #[serde(rename = "packages")]
    pub count: Option<usize>,

    /// `<package>` elements in document order.
    #[serde(default, rename = "package")]
    pub packages: Vec<Package>,
}

impl Primary {
    /// Construct an instance by parsing XML from a reader.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Ok(serde_xml_rs::from_reader(reader)?)
    }

    /// Construct an instance by parsing XML from a string.
    pub fn from_xml(s: &str) -> Result<Self> {
        Ok(serde_xml_rs::from_str(s)?)
    }
}

/// A package as advertised in a `primary.xml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    /// The type/flavor of the package, e.g. `rpm`.
    #[serde(rename = "type")]
    pub package_type: String,

    /// The name of the package.
    pub name: String,

    /// The machine architecture the package is targeting.
    pub arch: String,

    /// The package version.
    pub version: VersionTag,

    /// Content digest of the package file.
    pub checksum: Checksum,

    /// A longer text description of the package.
    pub description: Option<String>,

    /// Where the package can be obtained from.
    pub location: Location,

    /// Additional metadata about the package.
    pub format: Option<PackageFormat>,
}

/// The `<version>` element. Missing parts default to `0`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VersionTag {
    pub epoch: Option<String>,

    #[serde(rename = "ver")]
    pub version: Option<String>,

    #[serde(rename = "rel")]
    pub release: Option<String>,
}

impl VersionTag {
    /// Render as a fully qualified `EPOCH:UPSTREAM-RELEASE` string.
    pub fn evr(&self) -> String {
        evr_string(
            self.epoch.as_deref(),
            self.version.as_deref(),
            self.release.as_deref(),
        )
    }
}

/// Describes the content checksum of a package.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Checksum {
    /// Digest type.
    #[serde(rename = "type")]
    pub name: String,

    /// Hex encoded digest value.
    #[serde(rename = "$value")]
    pub value: String,

    #[serde(rename = "pkgid")]
    pub pkg_id: Option<String>,
}

/// Additional metadata about a package, from the RPM namespace.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PackageFormat {
    /// The package's license.
    pub license: Option<String>,

    /// Vendor of the package.
    pub vendor: Option<String>,

    /// Capabilities this package provides.
    pub provides: Option<Entries>,

    /// Capabilities this package requires.
    pub requires: Option<Entries>,

    /// Files provided by this package.
    #[serde(default, rename = "file")]
    pub files: Vec<FileEntry>,
}

/// A collection of [PackageEntry].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Entries {
    #[serde(default, rename = "entry")]
    pub entries: Vec<PackageEntry>,
}

/// Describes a package relationship.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PackageEntry {
    /// Name of the capability.
    pub name: String,

    /// Version comparison flags.
    pub flags: Option<String>,

    /// Epoch value of the version bound.
    pub epoch: Option<String>,

    /// Version of the bound.
    #[serde(rename = "ver")]
    pub version: Option<String>,

    /// Release of the bound.
    #[serde(rename = "rel")]
    pub release: Option<String>,
}

impl PackageEntry {
    /// Render this entry as a requirement expression: the bare
    /// capability name, or `NAME (OP VERSION)` when a comparison flag
    /// and version are present.
    pub fn requirement_expression(&self) -> String {
        match (
            self.flags.as_deref().and_then(relational_operator),
            &self.version,
        ) {
            (Some(op), Some(_)) => format!(
                "{} ({} {})",
                self.name,
                op,
                evr_string(
                    self.epoch.as_deref(),
                    self.version.as_deref(),
                    self.release.as_deref()
                )
            ),
            _ => self.name.clone(),
        }
    }
}

/// A `<file>` element.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FileEntry {
    /// Type of file. Missing implies a regular file.
    #[serde(rename = "type")]
    pub file_type: Option<String>,

    #[serde(rename = "$value")]
    pub value: String,
}

/// Map RPM comparison flags to the operator syntax used in requirement
/// expressions.
fn relational_operator(flags: &str) -> Option<&'static str> {
    match flags {
        "EQ" => Some("="),
        "GE" => Some(">="),
        "LE" => Some("<="),
        "GT" => Some(">"),
        "LT" => Some("<"),
        _ => None,
    }
}

fn evr_string(epoch: Option<&str>, version: Option<&str>, release: Option<&str>) -> String {
    format!(
        "{}:{}-{}",
        epoch.unwrap_or("0"),
        version.unwrap_or("0"),
        release.unwrap_or("0")
    )
}

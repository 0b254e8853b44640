// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `repomd.xml` file format. */

use {
    crate::{
        error::{AcquireError, Result},
        io::ContentDigest,
    },
    serde::{Deserialize, Serialize},
    std::io::Read,
};

/// A `repomd.xml` file: the index describing a repository's metadata artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMd {
    /// Revision of the repository. Often an integer-like value.
    pub revision: Option<String>,

    /// `<data>` elements describing the metadata files.
    pub data: Vec<RepoMdData>,
}

impl RepoMd {
    /// Construct an instance by parsing XML from a reader.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Ok(serde_xml_rs::from_reader(reader)?)
    }

    /// Construct an instance by parsing XML from a string.
    pub fn from_xml(s: &str) -> Result<Self> {
        Ok(serde_xml_rs::from_str(s)?)
    }

    /// Locate the metadata entry of a given type, e.g. `primary`.
    pub fn data_entry(&self, data_type: &'static str) -> Result<&RepoMdData> {
        self.data
            .iter()
            .find(|entry| entry.data_type == data_type)
            .ok_or(AcquireError::MetadataFileNotFound(data_type))
    }
}

/// A `<data>` element in a `repomd.xml` file.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RepoMdData {
    /// The type of data, e.g. `primary` or `filelists`.
    #[serde(rename = "type")]
    pub data_type: String,

    /// Content checksum of this file as stored.
    pub checksum: Checksum,

    /// Where the file is located, relative to the repository root.
    pub location: Location,

    /// Size in bytes of the file as stored in the repository.
    pub size: Option<u64>,
}

/// The content checksum of a `<data>` element.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Checksum {
    /// The name of the content digest.
    #[serde(rename = "type")]
    pub name: String,

    /// The hex encoded content digest.
    #[serde(rename = "$value")]
    pub value: String,
}

impl TryFrom<Checksum> for ContentDigest {
    type Error = AcquireError;

    fn try_from(v: Checksum) -> std::result::Result<Self, Self::Error> {
        match v.name.as_str() {
            "sha1" => ContentDigest::sha1_hex(&v.value),
            "sha256" => ContentDigest::sha256_hex(&v.value),
            name => Err(AcquireError::UnknownDigestFormat(name.to_string())),
        }
    }
}

/// The location of a metadata or package artifact.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Location {
    pub href: String,
}

#[cfg(test)]
mod test {
    use super::*;

    const REPOMD_XML: &str = include_str!("../testdata/repomd.xml");

    #[test]
    fn parse() -> Result<()> {
        let repomd = RepoMd::from_xml(REPOMD_XML)?;

        assert_eq!(repomd.revision.as_deref(), Some("1719415800"));

        let primary = repomd.data_entry("primary")?;
        assert_eq!(
            primary.location.href,
            "repodata/primary.xml.gz"
        );
        assert_eq!(primary.checksum.name, "sha256");
        assert_eq!(primary.size, Some(1947));

        assert!(matches!(
            repomd.data_entry("group"),
            Err(AcquireError::MetadataFileNotFound("group"))
        ));

        Ok(())
    }
}

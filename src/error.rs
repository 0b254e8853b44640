// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Error type for this crate.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("URL parse error: {0:?}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP error: {0:?}")]
    Http(#[from] reqwest::Error),

    #[error("XML error: {0:?}")]
    Xml(#[from] serde_xml_rs::Error),

    #[error("PGP error: {0:?}")]
    Pgp(#[from] pgp::errors::Error),

    #[error("repository I/O error on path {0}: {1:?}")]
    IoPath(String, std::io::Error),

    #[error("invalid hex in content digest: {0}; {1:?}")]
    ContentDigestBadHex(String, hex::FromHexError),

    #[error("unknown content digest format: {0}")]
    UnknownDigestFormat(String),

    #[error("unsupported metadata compression: {0}")]
    UnsupportedCompression(String),

    #[error("repository metadata entry not found: {0}")]
    MetadataFileNotFound(&'static str),

    #[error("content size missing from metadata entry")]
    MetadataMissingSize,

    #[error("package record missing required field: {0}")]
    DescriptorMissingField(&'static str),

    #[error("failed to parse requirement expression: {0}")]
    RequirementParse(String),

    #[error("no package matches requested name: {0}")]
    PackageNotFound(String),

    #[error("requested package not present in catalog: {0}")]
    SeedMissing(String),

    #[error("{package} requires {requirement}, which no known package satisfies")]
    UnsatisfiedDependency { package: String, requirement: String },

    #[error("{package} requires {requirement} ({constraint}), but {chosen} was already selected")]
    ConflictingDependency {
        package: String,
        requirement: String,
        constraint: String,
        chosen: String,
    },

    #[error("{package} requires {requirement} ({constraint}), which no candidate satisfies")]
    VersionConstraintUnsat {
        package: String,
        requirement: String,
        constraint: String,
    },

    #[error("{failed} of {total} downloads failed")]
    FetchFailed { failed: usize, total: usize },

    #[error("signature verification failed for: {}", .packages.join(", "))]
    VerificationFailed { packages: Vec<String> },

    #[error("keyring rejected: content is neither ASCII armor nor an OpenPGP packet stream")]
    KeyringRejected,

    #[error("malformed package file: {0}")]
    PackageFormat(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, AcquireError>;

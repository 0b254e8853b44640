// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Repository metadata retrieval and parsing.

Reading a repository is a three step protocol: fetch `repomd.xml` from
under the base URL, locate the `primary` metadata artifact it
advertises, then fetch and decode that artifact into a flat sequence of
[PackageDescriptor] records. The artifact's advertised size and checksum
are validated while it streams; a mismatch fails the whole parse rather
than yielding a partial catalog.
*/

pub mod primary;
pub mod repomd;

use {
    crate::{
        descriptor::{PackageDescriptor, RepositoryConfig},
        error::{AcquireError, Result},
        http,
        io::{read_decompressed, Compression, ContentDigest, ContentValidatingReader},
        metadata::repomd::RepoMd,
    },
    futures::AsyncReadExt,
    log::debug,
    std::collections::BTreeSet,
    url::Url,
};

/// Relative location of the repository index under the base URL.
pub const DEFAULT_REPOMD_PATH: &str = "repodata/repomd.xml";

/// Fetch and parse one repository's primary metadata.
///
/// The returned descriptors preserve document order. Source packages
/// (`arch == "src"`) are dropped.
pub async fn parse_repository(
    client: &reqwest::Client,
    config: &RepositoryConfig,
) -> Result<Vec<PackageDescriptor>> {
    let root_url = http::base_url(&config.base_url)?;

    let repomd_path = config.metadata_href.as_deref().unwrap_or(DEFAULT_REPOMD_PATH);

    let mut reader = http::fetch_url(client, &root_url, repomd_path).await?;
    let mut data = vec![];
    reader
        .read_to_end(&mut data)
        .await
        .map_err(|e| AcquireError::IoPath(repomd_path.to_string(), e))?;

    let repomd = RepoMd::from_reader(std::io::Cursor::new(data))?;
    let entry = repomd.data_entry("primary")?;

    let compression = Compression::for_metadata_path(&entry.location.href)?;
    let expected_size = entry.size.ok_or(AcquireError::MetadataMissingSize)?;
    let expected_digest = ContentDigest::try_from(entry.checksum.clone())?;

    let reader = http::fetch_url(client, &root_url, &entry.location.href).await?;
    let reader = ContentValidatingReader::new(reader, expected_size, expected_digest);
    let mut reader = read_decompressed(
        Box::pin(futures::io::BufReader::new(reader)),
        compression,
    );

    let mut data = vec![];
    reader
        .read_to_end(&mut data)
        .await
        .map_err(|e| AcquireError::IoPath(entry.location.href.clone(), e))?;

    let document = primary::Primary::from_reader(std::io::Cursor::new(data))?;

    let mut descriptors = Vec::with_capacity(document.packages.len());
    for package in document.packages {
        if let Some(descriptor) = descriptor_from_package(&root_url, package)? {
            descriptors.push(descriptor);
        }
    }

    debug!(
        "repository {}: {} package records",
        config.id,
        descriptors.len()
    );

    Ok(descriptors)
}

/// Convert one `<package>` element into a descriptor.
///
/// Returns `None` for source packages. Missing name or location is a
/// hard error; the rest of the record degrades to empty strings.
pub fn descriptor_from_package(
    root_url: &Url,
    package: primary::Package,
) -> Result<Option<PackageDescriptor>> {
    if package.arch == "src" {
        return Ok(None);
    }

    if package.name.is_empty() {
        return Err(AcquireError::DescriptorMissingField("name"));
    }

    if package.location.href.is_empty() {
        return Err(AcquireError::DescriptorMissingField("location"));
    }

    let url = root_url.join(&package.location.href)?;

    let mut provides = BTreeSet::new();
    provides.insert(package.name.clone());

    let mut requires = vec![];
    let mut requires_ver = vec![];
    let mut files = vec![];
    let mut license = String::new();
    let mut origin = String::new();

    if let Some(format) = package.format {
        license = format.license.unwrap_or_default();
        origin = format.vendor.unwrap_or_default();

        if let Some(entries) = format.provides {
            for entry in entries.entries {
                provides.insert(entry.name);
            }
        }

        if let Some(entries) = format.requires {
            for entry in entries.entries {
                requires_ver.push(entry.requirement_expression());
                requires.push(entry.name);
            }
        }

        files = format.files.into_iter().map(|f| f.value).collect();
    }

    let mut checksums = BTreeSet::new();
    checksums.insert((
        package.checksum.name.to_uppercase(),
        package.checksum.value.trim().to_string(),
    ));

    Ok(Some(PackageDescriptor {
        name: package.name,
        package_type: package.package_type,
        version: package.version.evr(),
        arch: package.arch,
        url: url.to_string(),
        description: package.description.unwrap_or_default(),
        license,
        origin,
        provides,
        requires,
        requires_ver,
        checksums,
        files,
    }))
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{dependency::Requirement, package_version::PackageVersion},
        std::fmt::Write as _,
    };

    const PRIMARY_XML: &str = include_str!("../testdata/primary.xml");
    const BASE_URL: &str = "https://packages.example.com/repo/";

    fn parse_fixture() -> Vec<PackageDescriptor> {
        let root_url = http::base_url(BASE_URL).unwrap();
        let document = primary::Primary::from_xml(PRIMARY_XML).unwrap();

        document
            .packages
            .into_iter()
            .filter_map(|p| descriptor_from_package(&root_url, p).unwrap())
            .collect()
    }

    #[test]
    fn source_packages_are_dropped() {
        let descriptors = parse_fixture();

        assert_eq!(descriptors.len(), 3);
        assert!(descriptors.iter().all(|d| d.arch != "src"));
    }

    #[test]
    fn descriptor_fields() {
        let descriptors = parse_fixture();
        let curl = &descriptors[0];

        assert_eq!(curl.name, "curl");
        assert_eq!(curl.package_type, "rpm");
        assert_eq!(curl.version, "0:8.8.0-2.azl3");
        assert_eq!(
            curl.url,
            "https://packages.example.com/repo/Packages/c/curl-8.8.0-2.azl3.x86_64.rpm"
        );
        assert_eq!(curl.file_name(), "curl-8.8.0-2.azl3.x86_64.rpm");
        assert_eq!(curl.license, "MIT");
        assert_eq!(curl.origin, "Microsoft Corporation");

        // Provides always contains the package's own name.
        assert!(curl.provides.contains("curl"));

        assert_eq!(curl.requires, vec!["libcurl", "libc.so.6()(64bit)"]);
        assert_eq!(
            curl.requires_ver,
            vec!["libcurl (>= 0:8.8.0-0)", "libc.so.6()(64bit)"]
        );
        assert_eq!(curl.requires.len(), curl.requires_ver.len());

        let checksum = curl.checksums.iter().next().unwrap();
        assert_eq!(checksum.0, "SHA256");

        assert_eq!(curl.files, vec!["/usr/bin/curl"]);
    }

    #[test]
    fn provides_includes_sonames() {
        let descriptors = parse_fixture();
        let glibc = descriptors.iter().find(|d| d.name == "glibc").unwrap();

        assert!(glibc.provides.contains("libc.so.6()(64bit)"));
        assert!(glibc.provides.contains("libc.so.6(GLIBC_2.34)(64bit)"));
        assert_eq!(glibc.files.len(), 2);
    }

    fn operator_flags(operator: &str) -> &'static str {
        match operator {
            "=" => "EQ",
            ">=" => "GE",
            "<=" => "LE",
            ">" => "GT",
            "<" => "LT",
            _ => panic!("unexpected operator {}", operator),
        }
    }

    fn entry_attributes(expression: &str) -> String {
        let requirement = Requirement::parse(expression).unwrap();

        let mut out = format!("name=\"{}\"", requirement.capability);

        if let Some(constraint) = requirement.constraint {
            let version = PackageVersion::parse(constraint.version.as_str());
            let _ = write!(
                out,
                " flags=\"{}\" epoch=\"{}\" ver=\"{}\" rel=\"{}\"",
                operator_flags(&constraint.relationship.to_string()),
                version.epoch(),
                version.upstream(),
                version.release(),
            );
        }

        out
    }

    /// Serialize descriptors back into a synthetic primary document.
    fn synthetic_primary_xml(descriptors: &[PackageDescriptor]) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<metadata packages=\"{}\">",
            descriptors.len()
        );

        for d in descriptors {
            let version = d.parsed_version();
            let (algorithm, value) = d.checksums.iter().next().unwrap();
            let href = d.url.strip_prefix(BASE_URL).unwrap();

            let _ = writeln!(out, "<package type=\"{}\">", d.package_type);
            let _ = writeln!(out, "  <name>{}</name>", d.name);
            let _ = writeln!(out, "  <arch>{}</arch>", d.arch);
            let _ = writeln!(
                out,
                "  <version epoch=\"{}\" ver=\"{}\" rel=\"{}\"/>",
                version.epoch(),
                version.upstream(),
                version.release()
            );
            let _ = writeln!(
                out,
                "  <checksum type=\"{}\" pkgid=\"YES\">{}</checksum>",
                algorithm.to_lowercase(),
                value
            );
            let _ = writeln!(out, "  <location href=\"{}\"/>", href);
            let _ = writeln!(out, "  <format>");

            let _ = writeln!(out, "    <provides>");
            for capability in &d.provides {
                let _ = writeln!(out, "      <entry name=\"{}\"/>", capability);
            }
            let _ = writeln!(out, "    </provides>");

            let _ = writeln!(out, "    <requires>");
            for expression in &d.requires_ver {
                let _ = writeln!(out, "      <entry {}/>", entry_attributes(expression));
            }
            let _ = writeln!(out, "    </requires>");

            for file in &d.files {
                let _ = writeln!(out, "    <file>{}</file>", file);
            }

            let _ = writeln!(out, "  </format>");
            let _ = writeln!(out, "</package>");
        }

        out.push_str("</metadata>\n");
        out
    }

    #[test]
    fn round_trip_preserves_canonical_fields() {
        let first = parse_fixture();

        let xml = synthetic_primary_xml(&first);
        let root_url = http::base_url(BASE_URL).unwrap();
        let document = primary::Primary::from_xml(&xml).unwrap();

        let second: Vec<PackageDescriptor> = document
            .packages
            .into_iter()
            .filter_map(|p| descriptor_from_package(&root_url, p).unwrap())
            .collect();

        assert_eq!(first.len(), second.len());

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.version, b.version);
            assert_eq!(a.arch, b.arch);
            assert_eq!(a.provides, b.provides);
            assert_eq!(a.requires, b.requires);
            assert_eq!(a.requires_ver, b.requires_ver);
            assert_eq!(a.url, b.url);
        }
    }
}

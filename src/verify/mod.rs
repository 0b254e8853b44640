// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Parallel artifact verification.

Every downloaded artifact is checked for an MD5 payload digest match
and at least one OpenPGP signature verifying against at least one key
from the supplied keyrings. Artifacts are verified concurrently; the
outcome list is index-aligned with the input list and is always
complete, leaving accept/reject policy to the caller.
*/

pub mod rpm;
mod signature;

use {
    crate::{
        error::{AcquireError, Result},
        progress::ProgressReporter,
    },
    futures::StreamExt,
    log::{debug, warn},
    md5::{Digest, Md5},
    pgp::{Deserializable, SignedPublicKey},
    std::{
        path::{Path, PathBuf},
        sync::Arc,
        time::{Duration, Instant},
    },
};

/// ASCII armor header opening a public key block.
const ARMOR_HEADER: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";

/// Minimum printable fraction for content to plausibly be a text keyring.
const MIN_PRINTABLE_RATIO: f64 = 0.30;

/// The per-artifact result of a verification run.
#[derive(Clone, Debug)]
pub struct VerificationOutcome {
    /// The artifact that was examined.
    pub path: PathBuf,

    /// Whether the artifact passed digest and signature checks.
    pub ok: bool,

    /// Wall time spent on this artifact.
    pub duration: Duration,

    /// Failure detail when `ok` is false.
    pub error: Option<String>,
}

/// Read and parse public keys from keyring files.
///
/// Armored and binary OpenPGP key material are both accepted; binary
/// content is normalized by parsing. Content that is neither and is
/// mostly unprintable is rejected outright.
pub fn load_keyrings(paths: &[PathBuf]) -> Result<Vec<SignedPublicKey>> {
    let mut keys = vec![];

    for path in paths {
        let data = std::fs::read(path)
            .map_err(|e| AcquireError::IoPath(path.display().to_string(), e))?;

        let key = parse_keyring(&data)?;
        debug!("loaded signing key from {}", path.display());
        keys.push(key);
    }

    Ok(keys)
}

fn parse_keyring(data: &[u8]) -> Result<SignedPublicKey> {
    let head = String::from_utf8_lossy(&data[..data.len().min(256)]);

    if head.trim_start().starts_with(ARMOR_HEADER) {
        let (key, _) = SignedPublicKey::from_armor_single(std::io::Cursor::new(data))?;
        return Ok(key);
    }

    match SignedPublicKey::from_bytes(std::io::Cursor::new(data)) {
        Ok(key) => Ok(key),
        Err(e) => {
            if printable_ratio(data) < MIN_PRINTABLE_RATIO {
                Err(AcquireError::KeyringRejected)
            } else {
                Err(e.into())
            }
        }
    }
}

fn printable_ratio(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let printable = data
        .iter()
        .filter(|b| b.is_ascii_graphic() || b.is_ascii_whitespace())
        .count();

    printable as f64 / data.len() as f64
}

/// Verify a list of artifacts against the union of the given keyrings,
/// N at a time.
///
/// The result has one entry per input path, in input order. Per-item
/// failures are reported through [VerificationOutcome::ok], never as an
/// error of the call itself.
pub async fn verify_artifacts(
    paths: &[PathBuf],
    keyrings: &[PathBuf],
    workers: usize,
    progress: &ProgressReporter,
) -> Result<Vec<VerificationOutcome>> {
    let total = paths.len();
    if total == 0 {
        return Ok(vec![]);
    }

    let keys = Arc::new(load_keyrings(keyrings)?);
    let workers = workers.max(1);

    let jobs = paths.iter().enumerate().map(|(index, path)| {
        let keys = Arc::clone(&keys);
        let path = path.clone();

        async move {
            let error_path = path.clone();

            let outcome = tokio::task::spawn_blocking(move || verify_artifact(&path, &keys)).await;

            match outcome {
                Ok(outcome) => (index, outcome),
                Err(e) => (
                    index,
                    VerificationOutcome {
                        path: error_path,
                        ok: false,
                        duration: Duration::ZERO,
                        error: Some(format!("verification task failed: {}", e)),
                    },
                ),
            }
        }
    });

    let mut slots: Vec<Option<VerificationOutcome>> = vec![None; total];
    let mut stream = futures::stream::iter(jobs).buffer_unordered(workers);
    let mut done = 0usize;

    while let Some((index, outcome)) = stream.next().await {
        done += 1;
        progress.percent(((done * 100) / total) as u8);

        let label = outcome
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if outcome.ok {
            progress.status(&format!("verified {}", label));
        } else {
            warn!(
                "verification of {} failed: {}",
                outcome.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
            progress.status(&format!("verification failed for {}", label));
        }

        slots[index] = Some(outcome);
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Verify one artifact. Infallible by construction: every failure mode
/// becomes an outcome with `ok == false`.
pub fn verify_artifact(path: &Path, keys: &[SignedPublicKey]) -> VerificationOutcome {
    let started = Instant::now();
    let result = verify_artifact_inner(path, keys);

    match result {
        Ok(()) => VerificationOutcome {
            path: path.to_path_buf(),
            ok: true,
            duration: started.elapsed(),
            error: None,
        },
        Err(error) => VerificationOutcome {
            path: path.to_path_buf(),
            ok: false,
            duration: started.elapsed(),
            error: Some(error),
        },
    }
}

fn verify_artifact_inner(path: &Path, keys: &[SignedPublicKey]) -> std::result::Result<(), String> {
    let data = std::fs::read(path).map_err(|e| format!("unable to read package: {}", e))?;

    let section = rpm::SignatureSection::parse(&data).map_err(|e| e.to_string())?;

    let signed = &data[section.header_start..];
    let header = &data[section.header_start..section.header_end];

    match &section.md5 {
        Some(expected) => {
            let actual = Md5::digest(signed);
            if actual.as_slice() != expected.as_slice() {
                return Err("MD5 payload digest mismatch".to_string());
            }
        }
        None => return Err("MD5 payload digest missing from signature header".to_string()),
    }

    let mut signatures = vec![];

    for blob in &section.header_payload_signatures {
        for parsed in signature::parse_signatures(blob).map_err(|e| e.to_string())? {
            signatures.push((parsed, signed));
        }
    }

    for blob in &section.header_signatures {
        for parsed in signature::parse_signatures(blob).map_err(|e| e.to_string())? {
            signatures.push((parsed, header));
        }
    }

    if signatures.is_empty() {
        return Err("package carries no signatures".to_string());
    }

    for (parsed, region) in &signatures {
        if signature::signature_verifies(parsed, region, keys) {
            return Ok(());
        }
    }

    Err("no signature verified against the provided keys".to_string())
}

#[cfg(test)]
mod test {
    use {super::*, crate::verify::rpm::test::synthetic_rpm};

    /// Signature header tag numbers used by the fixtures.
    const SIGTAG_MD5: i32 = 1004;
    const SIGTAG_PGP: i32 = 1002;

    fn write_rpm(dir: &Path, name: &str, entries: &[(i32, Vec<u8>)], payload: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, synthetic_rpm(entries, payload)).unwrap();
        path
    }

    fn signed_region_md5(path: &Path) -> Vec<u8> {
        let data = std::fs::read(path).unwrap();
        let section = rpm::SignatureSection::parse(&data).unwrap();
        Md5::digest(&data[section.header_start..]).to_vec()
    }

    #[tokio::test]
    async fn outcomes_align_with_inputs() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing-1.0-1.x86_64.rpm");
        let garbage = dir.path().join("garbage-1.0-1.x86_64.rpm");
        std::fs::write(&garbage, b"not an rpm at all").unwrap();

        let paths = vec![missing.clone(), garbage.clone()];
        let progress = ProgressReporter::new();

        let outcomes = verify_artifacts(&paths, &[], 2, &progress).await.unwrap();

        assert_eq!(outcomes.len(), paths.len());
        for (outcome, path) in outcomes.iter().zip(paths.iter()) {
            assert_eq!(&outcome.path, path);
            assert!(!outcome.ok);
            assert!(outcome.error.is_some());
        }
    }

    #[test]
    fn missing_signatures_fail() {
        let dir = tempfile::tempdir().unwrap();

        // MD5 consistent, but no signature at all.
        let path = write_rpm(dir.path(), "unsigned.rpm", &[], b"payload");
        let md5 = signed_region_md5(&path);
        let path = write_rpm(
            dir.path(),
            "unsigned.rpm",
            &[(SIGTAG_MD5, md5)],
            b"payload",
        );

        let outcome = verify_artifact(&path, &[]);
        assert!(!outcome.ok);
        assert_eq!(
            outcome.error.as_deref(),
            Some("package carries no signatures")
        );
    }

    #[test]
    fn md5_mismatch_fails_before_signature_checks() {
        let dir = tempfile::tempdir().unwrap();

        let path = write_rpm(
            dir.path(),
            "tampered.rpm",
            &[(SIGTAG_MD5, vec![0u8; 16]), (SIGTAG_PGP, vec![1, 2, 3])],
            b"payload",
        );

        let outcome = verify_artifact(&path, &[]);
        assert!(!outcome.ok);
        assert_eq!(outcome.error.as_deref(), Some("MD5 payload digest mismatch"));
    }

    #[test]
    fn md5_absence_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_rpm(dir.path(), "nodigest.rpm", &[], b"payload");

        let outcome = verify_artifact(&path, &[]);
        assert!(!outcome.ok);
        assert_eq!(
            outcome.error.as_deref(),
            Some("MD5 payload digest missing from signature header")
        );
    }

    #[test]
    fn unreadable_artifact_reports_duration() {
        let outcome = verify_artifact(Path::new("/nonexistent/never.rpm"), &[]);

        assert!(!outcome.ok);
        assert!(outcome.error.unwrap().starts_with("unable to read package"));
    }

    #[test]
    fn binary_garbage_keyring_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.gpg");
        std::fs::write(&path, [0u8, 1, 2, 3, 254, 255, 128, 129, 7, 6]).unwrap();

        assert!(matches!(
            load_keyrings(&[path]),
            Err(AcquireError::KeyringRejected)
        ));
    }

    #[test]
    fn printable_garbage_keyring_keeps_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.asc");
        std::fs::write(&path, b"this is printable text but not a key").unwrap();

        assert!(matches!(
            load_keyrings(&[path]),
            Err(AcquireError::Pgp(_))
        ));
    }

    #[test]
    fn unreadable_keyring_is_an_io_error() {
        assert!(matches!(
            load_keyrings(&[PathBuf::from("/nonexistent/key.asc")]),
            Err(AcquireError::IoPath(_, _))
        ));
    }

    #[test]
    fn printable_ratio_bounds() {
        assert_eq!(printable_ratio(&[]), 0.0);
        assert!(printable_ratio(b"all printable text") > 0.99);
        assert!(printable_ratio(&[0u8; 100]) < 0.01);
    }
}

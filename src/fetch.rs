// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Concurrent artifact fetching.

Downloads a list of URLs into a flat cache directory, at most N
transfers in flight at once. The cache is idempotent: a file of
positive size is reused verbatim, a zero-byte file is re-downloaded.
Cancellation aborts in-flight transfers and removes their partial
files. Per-URL failures are logged and counted; the call fails at the
end with the aggregate count rather than on the first error.

The caller is expected to deduplicate URLs; within one invocation every
destination filename is touched by at most one worker.
*/

use {
    crate::{
        error::{AcquireError, Result},
        http,
        progress::ProgressReporter,
    },
    futures::StreamExt,
    log::{debug, warn},
    reqwest::Client,
    std::{
        path::Path,
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    tokio::io::AsyncWriteExt,
    tokio_util::sync::CancellationToken,
    url::Url,
};

/// Default number of concurrent transfers.
pub const DEFAULT_WORKERS: usize = 4;

/// Basename of a URL, used as the cache filename.
pub(crate) fn url_basename(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

enum FetchDisposition {
    /// An intact prior download was reused.
    Reused,
    /// Bytes were transferred.
    Downloaded(u64),
}

/// Ensure every URL has a file of positive size in `dest_dir`.
pub async fn fetch_urls(
    client: &Client,
    urls: &[String],
    dest_dir: &Path,
    workers: usize,
    progress: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<()> {
    if urls.is_empty() {
        return Ok(());
    }

    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| AcquireError::IoPath(dest_dir.display().to_string(), e))?;

    let workers = workers.max(1);
    let total = urls.len();
    let completed = AtomicUsize::new(0);
    let had_error = AtomicBool::new(false);

    let jobs = urls.iter().map(|url| {
        let dest_dir = dest_dir.to_path_buf();
        let completed = &completed;
        let had_error = &had_error;

        async move {
            let result = fetch_one(client, url, &dest_dir, cancel).await;

            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            progress.percent(((done * 100) / total) as u8);

            match result {
                Ok(FetchDisposition::Reused) => {
                    progress.status(&format!("cached {}", url_basename(url)));
                    0
                }
                Ok(FetchDisposition::Downloaded(bytes)) => {
                    debug!("downloaded {} ({} bytes)", url, bytes);
                    progress.status(&format!("downloaded {}", url_basename(url)));
                    0
                }
                Err(e) => {
                    had_error.store(true, Ordering::SeqCst);
                    warn!("download of {} failed: {}", url, e);
                    progress.status(&format!("failed {}", url_basename(url)));
                    1
                }
            }
        }
    });

    let failed: usize = futures::stream::iter(jobs)
        .buffer_unordered(workers)
        .collect::<Vec<usize>>()
        .await
        .into_iter()
        .sum();

    if cancel.is_cancelled() {
        return Err(AcquireError::Cancelled);
    }

    if had_error.load(Ordering::SeqCst) {
        return Err(AcquireError::FetchFailed { failed, total });
    }

    Ok(())
}

async fn fetch_one(
    client: &Client,
    url: &str,
    dest_dir: &Path,
    cancel: &CancellationToken,
) -> Result<FetchDisposition> {
    let request_url = Url::parse(url)?;
    let dest = dest_dir.join(url_basename(url));

    match tokio::fs::metadata(&dest).await {
        Ok(metadata) if metadata.len() > 0 => {
            debug!("reusing {}", dest.display());
            return Ok(FetchDisposition::Reused);
        }
        Ok(_) => {
            debug!("re-downloading zero byte file {}", dest.display());
        }
        Err(_) => {}
    }

    if cancel.is_cancelled() {
        return Err(AcquireError::Cancelled);
    }

    let res = http::get_checked(client, request_url).await?;

    let mut file = tokio::fs::File::create(&dest)
        .await
        .map_err(|e| AcquireError::IoPath(dest.display().to_string(), e))?;

    let mut stream = Box::pin(res.bytes_stream());

    let outcome = tokio::select! {
        _ = cancel.cancelled() => Err(AcquireError::Cancelled),
        written = write_stream(&mut stream, &mut file, &dest) => written,
    };

    match outcome {
        Ok(written) => {
            file.flush()
                .await
                .map_err(|e| AcquireError::IoPath(dest.display().to_string(), e))?;

            Ok(FetchDisposition::Downloaded(written))
        }
        Err(e) => {
            // Leave no partial file behind.
            drop(file);
            let _ = tokio::fs::remove_file(&dest).await;
            Err(e)
        }
    }
}

async fn write_stream(
    stream: &mut (impl futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin),
    file: &mut tokio::fs::File,
    dest: &Path,
) -> Result<u64> {
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;

        file.write_all(&chunk)
            .await
            .map_err(|e| AcquireError::IoPath(dest.display().to_string(), e))?;

        written += chunk.len() as u64;
    }

    Ok(written)
}

#[cfg(test)]
mod test {
    use super::*;

    // Nothing listens here; any attempted transfer fails fast.
    const DEAD_URL: &str = "http://127.0.0.1:9/artifacts/sample-1.0-1.x86_64.rpm";

    #[test]
    fn url_basenames() {
        assert_eq!(
            url_basename("https://example.com/repo/Packages/c/curl-8.8.0-2.azl3.x86_64.rpm"),
            "curl-8.8.0-2.azl3.x86_64.rpm"
        );
        assert_eq!(url_basename("name-only"), "name-only");
    }

    #[tokio::test]
    async fn intact_files_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sample-1.0-1.x86_64.rpm"), b"content").unwrap();

        let client = http::build_client().unwrap();
        let progress = ProgressReporter::new();
        let cancel = CancellationToken::new();

        // Succeeds without touching the network.
        fetch_urls(
            &client,
            &[DEAD_URL.to_string()],
            dir.path(),
            2,
            &progress,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(
            std::fs::read(dir.path().join("sample-1.0-1.x86_64.rpm")).unwrap(),
            b"content"
        );
    }

    #[tokio::test]
    async fn zero_byte_files_are_retried_and_failures_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sample-1.0-1.x86_64.rpm"), b"").unwrap();

        let client = http::build_client().unwrap();
        let progress = ProgressReporter::new();
        let cancel = CancellationToken::new();

        let err = fetch_urls(
            &client,
            &[DEAD_URL.to_string()],
            dir.path(),
            2,
            &progress,
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            AcquireError::FetchFailed { failed: 1, total: 1 }
        ));
    }

    #[tokio::test]
    async fn cancellation_short_circuits() {
        let dir = tempfile::tempdir().unwrap();

        let client = http::build_client().unwrap();
        let progress = ProgressReporter::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetch_urls(
            &client,
            &[DEAD_URL.to_string()],
            dir.path(),
            2,
            &progress,
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AcquireError::Cancelled));
    }

    #[tokio::test]
    async fn destination_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("cache").join("packages");

        let client = http::build_client().unwrap();
        let progress = ProgressReporter::new();
        let cancel = CancellationToken::new();

        let _ = fetch_urls(&client, &[], &nested, 2, &progress, &cancel).await;
        let _ = fetch_urls(
            &client,
            &[DEAD_URL.to_string()],
            &nested,
            2,
            &progress,
            &cancel,
        )
        .await;

        assert!(nested.is_dir());
    }
}

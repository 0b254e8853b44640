// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Stream helpers: decompression and content digest validation. */

use {
    crate::error::{AcquireError, Result},
    async_compression::futures::bufread::{GzipDecoder, ZstdDecoder},
    futures::{AsyncBufRead, AsyncRead},
    pin_project::pin_project,
    std::{
        fmt::Formatter,
        pin::Pin,
        task::{Context, Poll},
    },
};

/// Compression formats accepted for repository metadata artifacts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compression {
    /// Gzip compression (`.gz`).
    Gzip,
    /// Zstandard compression (`.zst`).
    Zstd,
}

impl Compression {
    /// Derive the compression format from a metadata artifact path.
    ///
    /// Anything other than a known suffix is a hard error, not a
    /// fallback to identity decoding.
    pub fn for_metadata_path(path: &str) -> Result<Self> {
        match path {
            _ if path.ends_with(".gz") => Ok(Self::Gzip),
            _ if path.ends_with(".zst") => Ok(Self::Zstd),
            _ => Err(AcquireError::UnsupportedCompression(path.to_string())),
        }
    }
}

/// Wrap a reader with transparent decompression.
pub fn read_decompressed<'a>(
    stream: impl AsyncBufRead + Send + 'a,
    compression: Compression,
) -> Pin<Box<dyn AsyncRead + Send + 'a>> {
    match compression {
        Compression::Gzip => Box::pin(GzipDecoder::new(stream)),
        Compression::Zstd => Box::pin(ZstdDecoder::new(stream)),
    }
}

/// Represents a content digest.
#[derive(Clone, Eq, PartialEq)]
pub enum ContentDigest {
    /// A SHA-1 digest.
    Sha1(Vec<u8>),
    /// A SHA-256 digest.
    Sha256(Vec<u8>),
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha1(data) => write!(f, "Sha1({})", hex::encode(data)),
            Self::Sha256(data) => write!(f, "Sha256({})", hex::encode(data)),
        }
    }
}

impl ContentDigest {
    /// Create a new SHA-1 instance by parsing a hex digest.
    pub fn sha1_hex(digest: &str) -> Result<Self> {
        Ok(Self::Sha1(decode_hex(digest)?))
    }

    /// Create a new SHA-256 instance by parsing a hex digest.
    pub fn sha256_hex(digest: &str) -> Result<Self> {
        Ok(Self::Sha256(decode_hex(digest)?))
    }

    /// Create a new hasher matching the type of this digest.
    pub fn new_hasher(&self) -> Box<dyn digest::DynDigest + Send> {
        match self {
            Self::Sha1(_) => Box::new(sha1::Sha1::default()),
            Self::Sha256(_) => Box::new(sha2::Sha256::default()),
        }
    }

    /// Obtain the digest bytes for this content digest.
    pub fn digest_bytes(&self) -> &[u8] {
        match self {
            Self::Sha1(x) => x,
            Self::Sha256(x) => x,
        }
    }

    /// Obtain the hex encoded content digest.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest_bytes())
    }
}

fn decode_hex(digest: &str) -> Result<Vec<u8>> {
    hex::decode(digest).map_err(|e| AcquireError::ContentDigestBadHex(digest.to_string(), e))
}

/// An [AsyncRead] adapter that validates source size and digest.
///
/// Data streams through unchanged. Once the expected number of bytes
/// has been read, the accumulated digest is compared against the
/// expected one and a mismatch surfaces as a read error. Validation
/// only occurs if the stream is read to completion.
#[pin_project]
pub struct ContentValidatingReader<R> {
    hasher: Option<Box<dyn digest::DynDigest + Send>>,
    expected_size: u64,
    expected_digest: ContentDigest,
    #[pin]
    source: R,
    bytes_read: u64,
}

impl<R> ContentValidatingReader<R> {
    /// Create an instance bound to a source with an expected size and digest.
    pub fn new(source: R, expected_size: u64, expected_digest: ContentDigest) -> Self {
        Self {
            hasher: Some(expected_digest.new_hasher()),
            expected_size,
            expected_digest,
            source,
            bytes_read: 0,
        }
    }
}

impl<R> AsyncRead for ContentValidatingReader<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        let mut this = self.project();

        let size = match this.source.as_mut().poll_read(cx, buf) {
            Poll::Ready(Ok(size)) => size,
            res => return res,
        };

        if size > 0 {
            if let Some(hasher) = this.hasher.as_mut() {
                hasher.update(&buf[0..size]);
            }

            *this.bytes_read += size as u64;
        }

        match (*this.bytes_read).cmp(this.expected_size) {
            std::cmp::Ordering::Equal => {
                if let Some(hasher) = this.hasher.take() {
                    let got_digest = hasher.finalize();

                    if got_digest.as_ref() != this.expected_digest.digest_bytes() {
                        return Poll::Ready(Err(std::io::Error::new(
                            std::io::ErrorKind::Other,
                            format!(
                                "digest mismatch of retrieved content: expected {}, got {}",
                                this.expected_digest.digest_hex(),
                                hex::encode(got_digest)
                            ),
                        )));
                    }
                }
            }
            std::cmp::Ordering::Greater => {
                return Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!(
                        "extra bytes read: expected {}; got {}",
                        this.expected_size, this.bytes_read
                    ),
                )));
            }
            std::cmp::Ordering::Less => {}
        }

        Poll::Ready(Ok(size))
    }
}

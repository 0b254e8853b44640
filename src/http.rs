// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! HTTP client plumbing for repository access. */

use {
    crate::error::{AcquireError, Result},
    futures::{AsyncRead, TryStreamExt},
    reqwest::{Client, ClientBuilder, StatusCode, Url},
    std::{pin::Pin, time::Duration},
};

/// Default HTTP user agent string.
pub const USER_AGENT: &str = "rpm-acquire Rust crate (https://crates.io/crates/rpm-acquire)";

/// Time allowed to establish a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on a single request, metadata or artifact.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(1800);

/// Construct the HTTP client used for all repository interaction.
///
/// TLS certificate validation is on; there is deliberately no switch to
/// turn it off.
pub fn build_client() -> Result<Client> {
    Ok(ClientBuilder::new()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// Parse a repository base URL, ensuring a trailing slash.
///
/// Trailing slashes are significant to [Url::join]: without one the
/// final path component would be replaced on join instead of appended
/// under.
pub fn base_url(url: &str) -> Result<Url> {
    let mut url = Url::parse(url)?;

    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }

    Ok(url)
}

/// Issue a GET request, requiring a 200 response.
pub async fn get_checked(client: &Client, url: Url) -> Result<reqwest::Response> {
    let label = url.path().to_string();

    let res = client.get(url.clone()).send().await.map_err(|e| {
        AcquireError::IoPath(
            label.clone(),
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("error sending HTTP request: {:?}", e),
            ),
        )
    })?;

    match res.status() {
        StatusCode::OK => Ok(res),
        StatusCode::NOT_FOUND => Err(AcquireError::IoPath(
            label,
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("HTTP 404 for {}", url)),
        )),
        status => Err(AcquireError::IoPath(
            label,
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("bad HTTP status code: {}", status),
            ),
        )),
    }
}

/// Fetch a path relative to a root URL as an async reader over the
/// response body.
pub async fn fetch_url(
    client: &Client,
    root_url: &Url,
    path: &str,
) -> Result<Pin<Box<dyn AsyncRead + Send>>> {
    let request_url = root_url.join(path)?;

    let res = get_checked(client, request_url).await?;

    Ok(Box::pin(
        res.bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("{:?}", e)))
            .into_async_read(),
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = base_url("https://example.com/repo").unwrap();
        assert_eq!(url.as_str(), "https://example.com/repo/");

        let joined = url.join("repodata/repomd.xml").unwrap();
        assert_eq!(joined.as_str(), "https://example.com/repo/repodata/repomd.xml");
    }

    #[test]
    fn base_url_preserves_existing_slash() {
        let url = base_url("https://example.com/repo/").unwrap();
        assert_eq!(url.as_str(), "https://example.com/repo/");
    }
}

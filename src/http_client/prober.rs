//! Existence probing for decree URLs.
//!
//! With head-check on, a HEAD goes first. Whatever it says, the document is
//! then fetched with GET: a "present" HEAD leads to the download, an "absent"
//! one (404 or a failed request) to a confirming GET whose 404 is final.

use tracing::debug;

use super::{DocumentFetcher, FetchError};

/// Final answer for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// The archive answered 404 to the GET.
    Absent,
    /// The GET succeeded.
    Present { http_status: u16, body: Vec<u8> },
}

/// HEAD statuses that count as presence: 2xx, 3xx and 405 (HEAD not allowed).
pub fn head_indicates_presence(status: u16) -> bool {
    (200..400).contains(&status) || status == 405
}

async fn head_says_present(fetcher: &dyn DocumentFetcher, url: &str) -> bool {
    match fetcher.head_status(url).await {
        Ok(status) => head_indicates_presence(status),
        Err(e) => {
            debug!("HEAD {} failed: {}", url, e);
            false
        }
    }
}

/// Probe `url`. Only a non-404 failure of the GET is an error.
pub async fn probe(
    fetcher: &dyn DocumentFetcher,
    url: &str,
    head_check: bool,
) -> Result<Probe, FetchError> {
    let confirming = head_check && !head_says_present(fetcher, url).await;
    if confirming {
        debug!("HEAD reports {} absent, confirming with GET", url);
    }

    let fetched = fetcher.get(url).await?;
    if fetched.status == 404 {
        return Ok(Probe::Absent);
    }
    if !fetched.is_success() {
        return Err(FetchError::Status(fetched.status));
    }
    if confirming {
        debug!("GET contradicts HEAD for {} ({})", url, fetched.status);
    }
    Ok(Probe::Present {
        http_status: fetched.status,
        body: fetched.body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::FetchedBody;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        head: Result<u16, ()>,
        get: u16,
        heads: AtomicUsize,
        gets: AtomicUsize,
    }

    impl Scripted {
        fn new(head: Result<u16, ()>, get: u16) -> Self {
            Self {
                head,
                get,
                heads: AtomicUsize::new(0),
                gets: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentFetcher for Scripted {
        async fn head_status(&self, _url: &str) -> Result<u16, FetchError> {
            self.heads.fetch_add(1, Ordering::SeqCst);
            self.head
                .map_err(|_| FetchError::Transport("connection reset".into()))
        }

        async fn get(&self, _url: &str) -> Result<FetchedBody, FetchError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            let body = if self.get == 200 { b"%PDF".to_vec() } else { Vec::new() };
            Ok(FetchedBody {
                status: self.get,
                body,
            })
        }
    }

    #[test]
    fn test_head_presence_statuses() {
        assert!(head_indicates_presence(200));
        assert!(head_indicates_presence(302));
        assert!(head_indicates_presence(405));
        assert!(!head_indicates_presence(404));
        assert!(!head_indicates_presence(500));
    }

    #[tokio::test]
    async fn test_head_404_confirmed_by_get() {
        let fetcher = Scripted::new(Ok(404), 404);
        assert_eq!(probe(&fetcher, "u", true).await.unwrap(), Probe::Absent);
        assert_eq!(fetcher.heads.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_head_failure_but_get_succeeds() {
        let fetcher = Scripted::new(Err(()), 200);
        let result = probe(&fetcher, "u", true).await.unwrap();
        assert_eq!(
            result,
            Probe::Present {
                http_status: 200,
                body: b"%PDF".to_vec()
            }
        );
    }

    #[tokio::test]
    async fn test_no_head_when_disabled() {
        let fetcher = Scripted::new(Ok(200), 200);
        probe(&fetcher, "u", false).await.unwrap();
        assert_eq!(fetcher.heads.load(Ordering::SeqCst), 0);
        assert_eq!(fetcher.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_error() {
        let fetcher = Scripted::new(Ok(405), 503);
        let err = probe(&fetcher, "u", true).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(503)));
    }
}

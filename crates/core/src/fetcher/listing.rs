//! Paginated catalog traversal.
//!
//! Walks the listing search results page by page, resolving each row to a
//! checksum-identified episode. Rows whose title carries no checksum fall
//! back to the detail page's file list. The first sighting of a checksum
//! wins; later duplicates are ignored.

use std::collections::HashSet;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ListingConfig;
use crate::index::EpisodeRecord;
use crate::release::{self, QualityFilter};

use super::markup::{self, ListingRow};
use super::{FetchError, PageFetcher};

/// Result of a catalog traversal.
#[derive(Debug, Default)]
pub struct ListingOutcome {
    /// Accepted episodes in first-sighting order.
    pub episodes: Vec<EpisodeRecord>,
    /// Pages fully processed.
    pub pages_fetched: u32,
    /// Page count advertised by the first page.
    pub total_pages: u32,
    /// In-scope releases whose detail page yielded no extractable checksum.
    /// A growing count usually means the site markup drifted.
    pub no_checksum: u64,
    /// Whether traversal stopped early on cancellation.
    pub interrupted: bool,
}

pub struct ListingFetcher<'a> {
    fetcher: &'a dyn PageFetcher,
    config: ListingConfig,
    filter: QualityFilter,
}

impl<'a> ListingFetcher<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, config: &ListingConfig) -> Self {
        Self {
            fetcher,
            filter: QualityFilter::new(config.accepted_tiers.clone()),
            config: config.clone(),
        }
    }

    fn page_url(&self, page: u32) -> String {
        format!("{}&p={}", self.config.base_url, page)
    }

    fn absolute(&self, path: &str) -> String {
        format!("{}{}", self.config.site_root.trim_end_matches('/'), path)
    }

    /// Accept `text` as an episode if it is in scope, passes the quality
    /// filter, and carries an unseen checksum.
    fn consider(
        &self,
        text: &str,
        page_link: &str,
        magnet_link: Option<&str>,
        seen: &mut HashSet<String>,
        episodes: &mut Vec<EpisodeRecord>,
    ) -> bool {
        if !release::in_scope(text, &self.config.marker) || !self.filter.accepts(text) {
            return false;
        }
        let Some(crc32) = release::authoritative_checksum(text) else {
            return false;
        };
        if !seen.insert(crc32.clone()) {
            return false;
        }
        debug!(crc32 = %crc32, title = %text, "Indexed episode");
        episodes.push(EpisodeRecord {
            crc32,
            title: text.to_string(),
            page_link: page_link.to_string(),
            magnet_link: magnet_link.map(str::to_string),
        });
        true
    }

    async fn process_row(
        &self,
        row: &ListingRow,
        seen: &mut HashSet<String>,
        outcome: &mut ListingOutcome,
    ) {
        let page_link = self.absolute(&row.page_path);
        let magnet = row.magnet_link.as_deref();

        if release::authoritative_checksum(&row.title).is_some() {
            self.consider(&row.title, &page_link, magnet, seen, &mut outcome.episodes);
            return;
        }

        // Batch releases keep the checksum in the per-file names instead of
        // the release title. Marker and quality are judged per file name, so
        // only the marker gates the detail fetch.
        if !release::in_scope(&row.title, &self.config.marker) {
            return;
        }

        let html = match self.fetcher.get(&page_link).await {
            Ok(html) => html,
            Err(e) => {
                debug!(page_link = %page_link, error = %e, "Failed to fetch detail page");
                return;
            }
        };

        let mut any_checksum = false;
        for name in markup::detail_file_names(&html) {
            if release::authoritative_checksum(&name).is_some() {
                any_checksum = true;
            }
            self.consider(&name, &page_link, magnet, seen, &mut outcome.episodes);
        }
        if !any_checksum {
            warn!(title = %row.title, "No checksum found for release");
            outcome.no_checksum += 1;
        }
    }

    /// Traverse the full listing and return every accepted episode.
    ///
    /// A page failure after the first page ends the traversal with partial
    /// results rather than an error.
    pub async fn fetch_catalog(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ListingOutcome, FetchError> {
        let mut outcome = ListingOutcome::default();
        let mut seen = HashSet::new();

        let first = self.fetcher.get(&self.page_url(1)).await?;
        outcome.total_pages = markup::total_pages(&first);
        info!(total_pages = outcome.total_pages, "Traversing listing");

        let mut page_html = Some(first);
        for page in 1..=outcome.total_pages {
            if cancel.is_cancelled() {
                outcome.interrupted = true;
                break;
            }

            // Page 1 was already fetched for the page count.
            let html = match page_html.take() {
                Some(html) => html,
                None => match self.fetcher.get(&self.page_url(page)).await {
                    Ok(html) => html,
                    Err(e) => {
                        warn!(page, error = %e, "Failed to fetch listing page, stopping");
                        break;
                    }
                },
            };

            for row in markup::listing_rows(&html) {
                if cancel.is_cancelled() {
                    outcome.interrupted = true;
                    break;
                }
                self.process_row(&row, &mut seen, &mut outcome).await;
            }
            if outcome.interrupted {
                break;
            }

            outcome.pages_fetched = page;
            if page < outcome.total_pages && self.config.page_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.page_delay_ms)).await;
            }
        }

        info!(
            episodes = outcome.episodes.len(),
            pages = outcome.pages_fetched,
            "Listing traversal finished"
        );
        Ok(outcome)
    }

    /// Search the site for a checksum and return the matching row, if the
    /// search resolves it unambiguously.
    pub async fn search_release(&self, crc32: &str) -> Result<Option<ListingRow>, FetchError> {
        let url = format!(
            "{}/?f=0&c=0_0&q={}",
            self.config.site_root.trim_end_matches('/'),
            urlencoding::encode(crc32)
        );
        let html = self.fetcher.get(&url).await?;

        let mut matches: Vec<ListingRow> = markup::listing_rows(&html)
            .into_iter()
            .filter(|row| {
                release::authoritative_checksum(&row.title).as_deref() == Some(crc32)
            })
            .collect();

        if matches.len() > 1 {
            warn!(crc32 = %crc32, count = matches.len(), "Ambiguous search results");
            return Ok(None);
        }
        Ok(matches.pop())
    }

    /// Magnet link for a checksum, resolved through a site search.
    pub async fn search_magnet(&self, crc32: &str) -> Result<Option<String>, FetchError> {
        Ok(self
            .search_release(crc32)
            .await?
            .and_then(|row| row.magnet_link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeFetcher {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn new(pages: Vec<(&str, String)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(url, html)| (url.to_string(), html))
                    .collect(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_count(&self, url: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|u| *u == url)
                .count()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn get(&self, url: &str) -> Result<String, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or(FetchError::Status(404))
        }
    }

    fn test_config() -> ListingConfig {
        ListingConfig {
            base_url: "https://example.test/?q=one+pace".to_string(),
            site_root: "https://example.test".to_string(),
            page_delay_ms: 0,
            ..ListingConfig::default()
        }
    }

    fn row_html(title: &str, view: &str, magnet: Option<&str>) -> String {
        let magnet = magnet
            .map(|m| format!(r#"<a href="{m}">m</a>"#))
            .unwrap_or_default();
        format!(
            r#"<tr><td><a href="{view}" title="t">{title}</a></td><td>{magnet}</td></tr>"#
        )
    }

    fn listing_page(pages: u32, rows: &[String]) -> String {
        let pagination: String = (1..=pages)
            .map(|p| format!(r#"<li><a href="?p={p}">{p}</a></li>"#))
            .collect();
        format!(
            r#"<html><body>
            <ul class="pagination">{pagination}</ul>
            <table class="torrent-list"><tbody>{}</tbody></table>
            </body></html>"#,
            rows.concat()
        )
    }

    #[tokio::test]
    async fn test_single_page_catalog() {
        let page = listing_page(
            1,
            &[row_html(
                "[One Pace] Romance Dawn 01 [1080p][AAAAAAAA].mkv",
                "/view/1",
                Some("magnet:?xt=urn:btih:aaaa"),
            )],
        );
        let fetcher = FakeFetcher::new(vec![("https://example.test/?q=one+pace&p=1", page)]);
        let listing = ListingFetcher::new(&fetcher, &test_config());

        let outcome = listing.fetch_catalog(&CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.total_pages, 1);
        assert_eq!(outcome.pages_fetched, 1);
        assert!(!outcome.interrupted);
        assert_eq!(outcome.episodes.len(), 1);

        let ep = &outcome.episodes[0];
        assert_eq!(ep.crc32, "AAAAAAAA");
        assert_eq!(ep.page_link, "https://example.test/view/1");
        assert_eq!(ep.magnet_link.as_deref(), Some("magnet:?xt=urn:btih:aaaa"));
    }

    #[tokio::test]
    async fn test_first_page_is_fetched_once() {
        let page = listing_page(1, &[]);
        let fetcher = FakeFetcher::new(vec![("https://example.test/?q=one+pace&p=1", page)]);
        let listing = ListingFetcher::new(&fetcher, &test_config());

        listing.fetch_catalog(&CancellationToken::new()).await.unwrap();
        assert_eq!(fetcher.request_count("https://example.test/?q=one+pace&p=1"), 1);
    }

    #[tokio::test]
    async fn test_first_sighting_wins_across_pages() {
        let page1 = listing_page(
            2,
            &[row_html(
                "[One Pace] Ep 1 [1080p][AAAAAAAA].mkv",
                "/view/1",
                Some("magnet:first"),
            )],
        );
        let page2 = listing_page(
            2,
            &[
                row_html(
                    "[One Pace] Ep 1 reupload [1080p][AAAAAAAA].mkv",
                    "/view/9",
                    Some("magnet:second"),
                ),
                row_html("[One Pace] Ep 2 [720p][BBBBBBBB].mkv", "/view/2", None),
            ],
        );
        let fetcher = FakeFetcher::new(vec![
            ("https://example.test/?q=one+pace&p=1", page1),
            ("https://example.test/?q=one+pace&p=2", page2),
        ]);
        let listing = ListingFetcher::new(&fetcher, &test_config());

        let outcome = listing.fetch_catalog(&CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.episodes.len(), 2);
        assert_eq!(outcome.episodes[0].crc32, "AAAAAAAA");
        assert_eq!(outcome.episodes[0].magnet_link.as_deref(), Some("magnet:first"));
        assert_eq!(outcome.episodes[1].crc32, "BBBBBBBB");
    }

    #[tokio::test]
    async fn test_out_of_scope_and_wrong_quality_rejected() {
        let page = listing_page(
            2,
            &[
                row_html("[Other Group] Ep 1 [1080p][AAAAAAAA].mkv", "/view/1", None),
                row_html("[One Pace] Ep 2 [480p][BBBBBBBB].mkv", "/view/2", None),
                row_html("[One Pace] Ep 3 [1080p][CCCCCCCC].mkv", "/view/3", None),
            ],
        );
        let page2 = listing_page(2, &[]);
        let fetcher = FakeFetcher::new(vec![
            ("https://example.test/?q=one+pace&p=1", page),
            ("https://example.test/?q=one+pace&p=2", page2),
        ]);
        let listing = ListingFetcher::new(&fetcher, &test_config());

        let outcome = listing.fetch_catalog(&CancellationToken::new()).await.unwrap();
        let checksums: Vec<&str> = outcome.episodes.iter().map(|e| e.crc32.as_str()).collect();
        assert_eq!(checksums, vec!["CCCCCCCC"]);
    }

    #[tokio::test]
    async fn test_detail_fallback_for_batch_release() {
        let page = listing_page(
            1,
            &[row_html(
                "[One Pace] Orange Town [1080p] Batch",
                "/view/5",
                Some("magnet:batch"),
            )],
        );
        let detail = r##"
            <div class="torrent-file-list">
                <ul>
                    <li><a href="#" class="folder">Orange Town</a>
                        <ul>
                            <li>[One Pace] Orange Town 01 [1080p][AAAAAAAA].mkv</li>
                            <li>[One Pace] Orange Town 02 [1080p][BBBBBBBB].mkv</li>
                        </ul>
                    </li>
                </ul>
            </div>"##
            .to_string();
        let fetcher = FakeFetcher::new(vec![
            ("https://example.test/?q=one+pace&p=1", page),
            ("https://example.test/view/5", detail),
        ]);
        let listing = ListingFetcher::new(&fetcher, &test_config());

        let outcome = listing.fetch_catalog(&CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.episodes.len(), 2);
        for ep in &outcome.episodes {
            assert_eq!(ep.page_link, "https://example.test/view/5");
            assert_eq!(ep.magnet_link.as_deref(), Some("magnet:batch"));
        }
    }

    #[tokio::test]
    async fn test_detail_fallback_without_title_quality_token() {
        // Batch titles often carry no quality token; the files do.
        let page = listing_page(
            1,
            &[row_html(
                "[One Pace] Orange Town (Batch)",
                "/view/6",
                Some("magnet:batch"),
            )],
        );
        let detail = r#"
            <div class="torrent-file-list">
                <ul>
                    <li>[One Pace] Orange Town 01 [1080p][AAAAAAAA].mkv</li>
                    <li>[One Pace] Orange Town 02 [1080p][BBBBBBBB].mkv</li>
                </ul>
            </div>"#
            .to_string();
        let fetcher = FakeFetcher::new(vec![
            ("https://example.test/?q=one+pace&p=1", page),
            ("https://example.test/view/6", detail),
        ]);
        let listing = ListingFetcher::new(&fetcher, &test_config());

        let outcome = listing.fetch_catalog(&CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.episodes.len(), 2);
        assert_eq!(outcome.no_checksum, 0);
    }

    #[tokio::test]
    async fn test_detail_page_without_checksums_is_counted() {
        let page = listing_page(
            1,
            &[row_html("[One Pace] Scripts [1080p]", "/view/7", None)],
        );
        let detail = r#"
            <div class="torrent-file-list">
                <ul><li>readme.txt</li></ul>
            </div>"#
            .to_string();
        let fetcher = FakeFetcher::new(vec![
            ("https://example.test/?q=one+pace&p=1", page),
            ("https://example.test/view/7", detail),
        ]);
        let listing = ListingFetcher::new(&fetcher, &test_config());

        let outcome = listing.fetch_catalog(&CancellationToken::new()).await.unwrap();

        assert!(outcome.episodes.is_empty());
        assert_eq!(outcome.no_checksum, 1);
    }

    #[tokio::test]
    async fn test_detail_page_failure_is_not_fatal() {
        let page = listing_page(
            1,
            &[
                row_html("[One Pace] Broken Batch [1080p]", "/view/404", None),
                row_html("[One Pace] Ep 9 [1080p][AAAAAAAA].mkv", "/view/9", None),
            ],
        );
        let fetcher = FakeFetcher::new(vec![("https://example.test/?q=one+pace&p=1", page)]);
        let listing = ListingFetcher::new(&fetcher, &test_config());

        let outcome = listing.fetch_catalog(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.episodes.len(), 1);
        assert_eq!(outcome.episodes[0].crc32, "AAAAAAAA");
    }

    #[tokio::test]
    async fn test_later_page_failure_returns_partial() {
        let page1 = listing_page(
            3,
            &[row_html("[One Pace] Ep 1 [1080p][AAAAAAAA].mkv", "/view/1", None)],
        );
        // Pages 2 and 3 are not served.
        let fetcher = FakeFetcher::new(vec![("https://example.test/?q=one+pace&p=1", page1)]);
        let listing = ListingFetcher::new(&fetcher, &test_config());

        let outcome = listing.fetch_catalog(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.episodes.len(), 1);
        assert_eq!(outcome.pages_fetched, 1);
        assert_eq!(outcome.total_pages, 3);
        assert!(!outcome.interrupted);
    }

    #[tokio::test]
    async fn test_first_page_failure_is_an_error() {
        let fetcher = FakeFetcher::new(vec![]);
        let listing = ListingFetcher::new(&fetcher, &test_config());

        let err = listing
            .fetch_catalog(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_traversal() {
        let page = listing_page(
            1,
            &[row_html("[One Pace] Ep 1 [1080p][AAAAAAAA].mkv", "/view/1", None)],
        );
        let fetcher = FakeFetcher::new(vec![("https://example.test/?q=one+pace&p=1", page)]);
        let listing = ListingFetcher::new(&fetcher, &test_config());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = listing.fetch_catalog(&cancel).await.unwrap();

        assert!(outcome.interrupted);
        assert!(outcome.episodes.is_empty());
    }

    #[tokio::test]
    async fn test_search_magnet_matches_trailing_checksum() {
        let results = listing_page(
            1,
            &[
                row_html(
                    "[One Pace] Ep 1 [1080p][AAAAAAAA].mkv",
                    "/view/1",
                    Some("magnet:right"),
                ),
                row_html(
                    "[One Pace] Ep 2 [1080p][BBBBBBBB].mkv",
                    "/view/2",
                    Some("magnet:wrong"),
                ),
            ],
        );
        let fetcher = FakeFetcher::new(vec![(
            "https://example.test/?f=0&c=0_0&q=AAAAAAAA",
            results,
        )]);
        let listing = ListingFetcher::new(&fetcher, &test_config());

        let magnet = listing.search_magnet("AAAAAAAA").await.unwrap();
        assert_eq!(magnet.as_deref(), Some("magnet:right"));
    }

    #[tokio::test]
    async fn test_search_release_none_when_absent() {
        let results = listing_page(1, &[]);
        let fetcher = FakeFetcher::new(vec![(
            "https://example.test/?f=0&c=0_0&q=AAAAAAAA",
            results,
        )]);
        let listing = ListingFetcher::new(&fetcher, &test_config());

        assert!(listing.search_release("AAAAAAAA").await.unwrap().is_none());
    }
}

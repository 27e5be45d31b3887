//! HTML extraction for listing and detail pages. Pure functions, no I/O.

use scraper::{ElementRef, Html, Selector};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// One candidate row from a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    /// Full release title as rendered in the row.
    pub title: String,
    /// Detail-page path, relative to the site root (`/view/...`).
    pub page_path: String,
    /// Magnet link attached to the row, if any.
    pub magnet_link: Option<String>,
}

/// Total page count advertised by the pagination controls.
///
/// Pages without pagination (single page of results) report 1.
pub fn total_pages(html: &str) -> u32 {
    let document = Html::parse_document(html);
    let links = selector("ul.pagination a");
    document
        .select(&links)
        .filter_map(|a| a.text().collect::<String>().trim().parse::<u32>().ok())
        .max()
        .unwrap_or(1)
}

/// Extract every result row from a listing page.
///
/// A row is kept when it carries a titled detail-page link; the magnet link
/// is whatever magnet anchor shares the row.
pub fn listing_rows(html: &str) -> Vec<ListingRow> {
    let document = Html::parse_document(html);
    let rows = selector("table.torrent-list tr");
    let anchors = selector("a[href]");

    let mut out = Vec::new();
    for row in document.select(&rows) {
        let mut title_link: Option<(String, String)> = None;
        let mut magnet_link: Option<String> = None;

        for a in row.select(&anchors) {
            let href = a.value().attr("href").unwrap_or_default();
            if href.starts_with("magnet:") {
                magnet_link = Some(href.to_string());
            } else if title_link.is_none()
                && href.starts_with("/view/")
                && !href.contains('#')
                && a.value().attr("title").is_some()
            {
                let text = a.text().collect::<String>().trim().to_string();
                title_link = Some((text, href.to_string()));
            }
        }

        if let Some((title, page_path)) = title_link {
            out.push(ListingRow {
                title,
                page_path,
                magnet_link,
            });
        }
    }
    out
}

/// Direct text content of an element, excluding nested elements.
fn direct_text(el: ElementRef<'_>) -> String {
    el.children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Extract file names from a detail page's file list.
///
/// Handles both the flat single-file layout and the collapsible folder tree;
/// in the tree, only leaf entries are file names.
pub fn detail_file_names(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let filelist = selector("div.torrent-file-list");
    let Some(div) = document.select(&filelist).next() else {
        return Vec::new();
    };

    let folder = selector("a.folder");
    let uls = selector("ul");
    let lis = selector("li");

    if div.select(&folder).next().is_some() {
        let mut names = Vec::new();
        for li in div.select(&lis) {
            if li.select(&uls).next().is_some() {
                continue;
            }
            let name = direct_text(li);
            if !name.is_empty() {
                names.push(name);
            }
        }
        names
    } else {
        div.select(&lis)
            .next()
            .map(direct_text)
            .filter(|name| !name.is_empty())
            .into_iter()
            .collect()
    }
}

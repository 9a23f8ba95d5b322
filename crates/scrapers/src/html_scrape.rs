//! Shared HTML parsing helpers for the listing/detail scrapers (EZTV's
//! fallback, TorrentGalaxy, 1337x). Each site's row shape is its own
//! function; only link resolution and magnet extraction are truly generic.

use scraper::{Html, Selector};
use url::Url;

/// A single parsed listing row, before its magnet is recovered from the
/// detail page.
#[derive(Debug, Clone)]
pub struct ListingRow {
    pub name: String,
    pub detail_url: String,
    pub seeders: i64,
    pub leechers: i64,
    pub size_label: Option<String>,
}

fn text_of(el: &scraper::ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn parse_int(s: &str) -> i64 {
    s.chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

/// TorrentGalaxy's `lmsearch` results table: `.table-list-wrap tbody tr`,
/// with the title+detail link in `.cellMainLink`, and seeders/leechers/size
/// cells identified by their well-known classes.
pub fn extract_tgx_rows(html: &str, base: &str) -> Vec<ListingRow> {
    let document = Html::parse_document(html);
    let Ok(row_sel) = Selector::parse(".table-list-wrap tbody tr") else {
        return Vec::new();
    };
    let name_sel = Selector::parse(".cellMainLink").unwrap();
    let seed_sel = Selector::parse(".tgxtableSeed").unwrap();
    let leech_sel = Selector::parse(".tgxtableLeech").unwrap();
    let size_sel = Selector::parse(".tgxtablesize").unwrap();

    let mut rows = Vec::new();
    for row in document.select(&row_sel) {
        let Some(name_el) = row.select(&name_sel).next() else {
            continue;
        };
        let Some(href) = name_el.value().attr("href") else {
            continue;
        };
        let name = text_of(&name_el);
        let seeders = row
            .select(&seed_sel)
            .next()
            .map(|e| parse_int(&text_of(&e)))
            .unwrap_or(0);
        let leechers = row
            .select(&leech_sel)
            .next()
            .map(|e| parse_int(&text_of(&e)))
            .unwrap_or(0);
        let size_label = row.select(&size_sel).next().map(|e| text_of(&e));

        rows.push(ListingRow {
            name,
            detail_url: resolve_url(base, href),
            seeders,
            leechers,
            size_label,
        });
    }
    rows
}

/// 1337x's search results table: `.table-list tbody tr`, name + detail link
/// in the second anchor of `td.coll-1` (the first is the category icon).
pub fn extract_1337x_rows(html: &str, base: &str) -> Vec<ListingRow> {
    let document = Html::parse_document(html);
    let Ok(row_sel) = Selector::parse(".table-list tbody tr") else {
        return Vec::new();
    };
    let name_sel = Selector::parse("td.coll-1 a").unwrap();
    let seed_sel = Selector::parse("td.coll-2").unwrap();
    let leech_sel = Selector::parse("td.coll-3").unwrap();
    let size_sel = Selector::parse("td.coll-4").unwrap();

    let mut rows = Vec::new();
    for row in document.select(&row_sel) {
        let anchors: Vec<_> = row.select(&name_sel).collect();
        let Some(name_el) = anchors.into_iter().find(|a| {
            a.value()
                .attr("href")
                .map(|h| h.starts_with("/torrent/"))
                .unwrap_or(false)
        }) else {
            continue;
        };
        let href = name_el.value().attr("href").unwrap_or_default();
        let name = text_of(&name_el);
        let seeders = row
            .select(&seed_sel)
            .next()
            .map(|e| parse_int(&text_of(&e)))
            .unwrap_or(0);
        let leechers = row
            .select(&leech_sel)
            .next()
            .map(|e| parse_int(&text_of(&e)))
            .unwrap_or(0);
        let size_label = row.select(&size_sel).next().map(|e| text_of(&e));

        rows.push(ListingRow {
            name,
            detail_url: resolve_url(base, href),
            seeders,
            leechers,
            size_label,
        });
    }
    rows
}

/// First `<a href^="prefix">` targets, in document order, up to `limit`.
pub fn extract_links_with_prefix(html: &str, prefix: &str, limit: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(sel) = Selector::parse("a") else {
        return Vec::new();
    };
    document
        .select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.starts_with(prefix))
        .map(str::to_string)
        .take(limit)
        .collect()
}

/// First `<a href^="magnet:">` anywhere in the document.
pub fn extract_first_magnet(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let sel = Selector::parse("a").ok()?;
    document
        .select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| href.starts_with("magnet:"))
        .map(str::to_string)
}

/// The document's `<title>` text, trimmed.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let sel = Selector::parse("title").ok()?;
    document.select(&sel).next().map(|el| text_of(&el))
}

/// Resolve a possibly-relative `href` against `base`.
pub fn resolve_url(base: &str, href: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tgx_rows() {
        let html = r#"
            <table class="table-list-wrap"><tbody>
                <tr>
                    <a class="cellMainLink" href="/1234/movie-name">Movie.Name.1080p</a>
                    <span class="tgxtableSeed">42</span>
                    <span class="tgxtableLeech">3</span>
                    <span class="tgxtablesize">1.4 GB</span>
                </tr>
            </tbody></table>
        "#;
        let rows = extract_tgx_rows(html, "https://tgx.example");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Movie.Name.1080p");
        assert_eq!(rows[0].seeders, 42);
        assert_eq!(rows[0].detail_url, "https://tgx.example/1234/movie-name");
    }

    #[test]
    fn extracts_1337x_rows_skipping_category_anchor() {
        let html = r#"
            <table class="table-list"><tbody>
                <tr>
                    <td class="coll-1 name">
                        <a href="/cat/Movies/">Movies</a>
                        <a href="/torrent/555/movie-name/">Movie.Name.1080p</a>
                    </td>
                    <td class="coll-2">17</td>
                    <td class="coll-3">2</td>
                    <td class="coll-4">1.1 GB</td>
                </tr>
            </tbody></table>
        "#;
        let rows = extract_1337x_rows(html, "https://1337x.example");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].detail_url, "https://1337x.example/torrent/555/movie-name/");
        assert_eq!(rows[0].seeders, 17);
    }

    #[test]
    fn extract_first_magnet_finds_the_first_link() {
        let html = r#"<a href="https://example.com">no</a><a href="magnet:?xt=urn:btih:abc">yes</a>"#;
        assert_eq!(
            extract_first_magnet(html).as_deref(),
            Some("magnet:?xt=urn:btih:abc")
        );
    }

    #[test]
    fn resolve_url_joins_relative_paths() {
        assert_eq!(
            resolve_url("https://example.com", "/ep/1"),
            "https://example.com/ep/1"
        );
    }
}

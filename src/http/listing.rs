//! Directory listing pages.

use std::fmt::Write;
use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::hits::{HitCounter, ResourceKey};

/// Bytes escaped when an entry name becomes part of a link.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const STYLE: &str = "body { font-family: Arial, sans-serif; margin: 20px; }\n\
h1 { border-bottom: 1px solid #ccc; }\n\
table { border-collapse: collapse; width: 100%; }\n\
th, td { text-align: left; padding: 8px; border-bottom: 1px solid #ddd; }\n\
th { background-color: #f2f2f2; }\n\
a { text-decoration: none; color: #0066cc; }\n";

struct Entry {
    name: String,
    is_dir: bool,
    key: ResourceKey,
}

/// Render the listing of `dir`, reached through `url_path`.
///
/// With a counter, a `Hits` column shows each file's count, looked up by
/// the entry's canonical path.
pub async fn render_listing(dir: &Path, url_path: &str, hits: Option<&HitCounter>) -> String {
    let title = escape_html(url_path);
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Directory listing for {title}</title>\n<style>\n{STYLE}</style>\n</head>\n<body>\n\
         <h1>Directory listing for {title}</h1>\n<table>\n"
    );
    html.push_str(if hits.is_some() {
        "<tr><th>File / Directory</th><th>Hits</th></tr>\n"
    } else {
        "<tr><th>File / Directory</th></tr>\n"
    });

    let decoded_base = url_path.trim_end_matches('/');
    let base = encode_url_path(decoded_base);
    if !decoded_base.is_empty() {
        let parent = match decoded_base.rfind('/') {
            Some(0) | None => "/",
            Some(i) => &decoded_base[..i],
        };
        let _ = writeln!(
            html,
            "<tr><td><a href=\"{}\">../</a></td>{}</tr>",
            escape_html(&encode_url_path(parent)),
            if hits.is_some() { "<td></td>" } else { "" }
        );
    }

    match read_entries(dir).await {
        Ok(entries) => {
            for entry in entries {
                let href = format!("{base}/{}", utf8_percent_encode(&entry.name, SEGMENT));
                let display = if entry.is_dir {
                    format!("{}/", escape_html(&entry.name))
                } else {
                    escape_html(&entry.name)
                };
                let _ = write!(html, "<tr><td><a href=\"{}\">{display}</a></td>", escape_html(&href));
                if let Some(hits) = hits {
                    if entry.is_dir {
                        html.push_str("<td></td>");
                    } else {
                        let _ = write!(html, "<td>{}</td>", hits.get(&entry.key).await);
                    }
                }
                html.push_str("</tr>\n");
            }
        }
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to read directory");
            let _ = writeln!(
                html,
                "<tr><td colspan=\"2\">Error reading directory: {}</td></tr>",
                escape_html(&e.to_string())
            );
        }
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}

/// Re-encode a decoded URL path one segment at a time.
fn encode_url_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

async fn read_entries(dir: &Path) -> std::io::Result<Vec<Entry>> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        let canonical = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        let is_dir = tokio::fs::metadata(&canonical)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        entries.push(Entry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir,
            key: ResourceKey::new(canonical),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hits::Consistency;
    use std::fs;
    use std::time::Duration;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        fs::write(dir.path().join("a.html"), b"<p>").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        dir
    }

    #[tokio::test]
    async fn lists_sorted_entries_without_hits() {
        let dir = fixture();
        let html = render_listing(dir.path(), "/", None).await;

        let a = html.find(">a.html<").unwrap();
        let b = html.find(">b.pdf<").unwrap();
        let docs = html.find(">docs/<").unwrap();
        assert!(a < b && b < docs);
        assert!(html.contains("<a href=\"/a.html\">a.html</a>"));
        assert!(!html.contains("Hits"));
        assert!(!html.contains(">../<"));
    }

    #[tokio::test]
    async fn shows_counts_keyed_by_canonical_path() {
        let dir = fixture();
        let canonical = dir.path().canonicalize().unwrap();
        let counter = HitCounter::new(Consistency::Locked, Duration::ZERO);
        let key = ResourceKey::new(canonical.join("b.pdf"));
        for _ in 0..3 {
            counter.increment(&key).await;
        }

        let html = render_listing(&canonical, "/", Some(&counter)).await;
        assert!(html.contains("<th>Hits</th>"));
        assert!(html.contains("<a href=\"/b.pdf\">b.pdf</a></td><td>3</td>"));
        assert!(html.contains("<a href=\"/a.html\">a.html</a></td><td>0</td>"));
        assert!(html.contains("<a href=\"/docs\">docs/</a></td><td></td>"));
    }

    #[tokio::test]
    async fn nested_listing_links_to_parent() {
        let dir = fixture();
        fs::create_dir(dir.path().join("docs/inner")).unwrap();
        let html = render_listing(&dir.path().join("docs"), "/docs/", None).await;
        assert!(html.contains("<a href=\"/\">../</a>"));
        assert!(html.contains("<a href=\"/docs/inner\">inner/</a>"));

        let html = render_listing(&dir.path().join("docs/inner"), "/docs/inner", None).await;
        assert!(html.contains("<a href=\"/docs\">../</a>"));
    }

    #[tokio::test]
    async fn escapes_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("<b> & c.html"), b"x").unwrap();
        let html = render_listing(dir.path(), "/", None).await;
        assert!(html.contains(">&lt;b&gt; &amp; c.html</a>"));
        assert!(html.contains("href=\"/%3Cb%3E%20&amp;%20c.html\""));
    }

    #[tokio::test]
    async fn links_reencode_the_directory_path() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a#b").join("c d");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("x.html"), b"x").unwrap();

        let html = render_listing(&nested, "/a#b/c d/", None).await;
        assert!(html.contains("<a href=\"/a%23b/c%20d/x.html\">x.html</a>"), "{html}");
        assert!(html.contains("<a href=\"/a%23b\">../</a>"), "{html}");
        assert!(!html.contains("href=\"/a#b"));
    }
}

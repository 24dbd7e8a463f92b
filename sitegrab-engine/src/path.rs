//! Deterministic URL to local file path mapping.

use crate::normalize::CanonicalUrl;
use std::path::{Component, Path, PathBuf};

const MAX_SEGMENT_CHARS: usize = 255;
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Map a canonical URL to the file it is mirrored into under `output_root`.
///
/// Total and pure: the same URL always yields the same path. The query
/// string does not take part in the mapping, so distinct query variants land
/// on the same path and are separated by the crawl state's path registry.
pub fn to_local_path(url: &CanonicalUrl, output_root: &Path) -> PathBuf {
    let decoded = urlencoding::decode_binary(url.path().as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);

    if decoded.is_empty() || decoded == "/" {
        return output_root.join("index.html");
    }

    let mut path = decoded.trim_start_matches('/').to_string();
    if path.is_empty() || path.ends_with('/') {
        path.push_str("index.html");
    } else {
        let file_name = path.rsplit('/').next().unwrap_or_default();
        if !file_name.contains('.') {
            path.push_str(".html");
        }
    }

    let raw_segments: Vec<&str> = path.split('/').collect();
    let last = raw_segments.len() - 1;
    let mut local = output_root.to_path_buf();
    for (idx, raw) in raw_segments.iter().enumerate() {
        let segment = sanitize_segment(raw);
        if segment.is_empty() {
            if idx == last {
                local.push("index.html");
            }
            continue;
        }
        local.push(segment);
    }
    local
}

/// Make a single path segment safe on common filesystems.
pub fn sanitize_segment(segment: &str) -> String {
    let mut cleaned = String::with_capacity(segment.len());
    let mut last_underscore = false;
    for ch in segment.chars() {
        let ch = if ILLEGAL_CHARS.contains(&ch) { '_' } else { ch };
        if ch == '_' {
            if last_underscore {
                continue;
            }
            last_underscore = true;
        } else {
            last_underscore = false;
        }
        cleaned.push(ch);
    }

    cleaned
        .trim_matches(|c| c == '.' || c == '_' || c == ' ')
        .chars()
        .take(MAX_SEGMENT_CHARS)
        .collect()
}

/// Variant of `path` carrying a stable hash of `url` before the extension,
/// used when another URL already owns `path`.
pub fn disambiguate(path: &Path, url: &CanonicalUrl) -> PathBuf {
    let hash = xxhash_rust::xxh3::xxh3_64(url.as_str().as_bytes()) as u32;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "index".to_string());
    let file_name = match path.extension() {
        Some(ext) => format!("{}-{:08x}.{}", stem, hash, ext.to_string_lossy()),
        None => format!("{}-{:08x}", stem, hash),
    };
    path.with_file_name(file_name)
}

/// Reference to `target` usable from inside the document stored at `from_file`.
///
/// Falls back to the absolute target path when no relative path exists.
pub fn relative_reference(from_file: &Path, target: &Path) -> String {
    let from_dir = from_file.parent().unwrap_or_else(|| Path::new(""));
    match pathdiff::diff_paths(target, from_dir) {
        Some(rel) if !rel.as_os_str().is_empty() => to_href(&rel),
        _ => to_href(target),
    }
}

/// File names are stored decoded; each one is re-encoded so that `%`, `#`,
/// `?` and spaces survive URL resolution.
fn to_href(path: &Path) -> String {
    path.components()
        .map(|c| match c {
            Component::Normal(name) => urlencoding::encode(&name.to_string_lossy()).into_owned(),
            other => other.as_os_str().to_string_lossy().to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
        .replace("//", "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(url: &str) -> PathBuf {
        to_local_path(&CanonicalUrl::parse(url).unwrap(), Path::new("out"))
    }

    #[test]
    fn test_root_maps_to_index() {
        assert_eq!(map("https://example.com"), Path::new("out/index.html"));
        assert_eq!(map("https://example.com/"), Path::new("out/index.html"));
        assert_eq!(map("https://example.com/?page=2"), Path::new("out/index.html"));
    }

    #[test]
    fn test_extensionless_gets_html_suffix() {
        assert_eq!(map("https://example.com/about"), Path::new("out/about.html"));
        assert_eq!(
            map("https://example.com/blog/2024/post"),
            Path::new("out/blog/2024/post.html")
        );
    }

    #[test]
    fn test_directory_gets_index() {
        assert_eq!(
            map("https://example.com/docs/"),
            Path::new("out/docs/index.html")
        );
    }

    #[test]
    fn test_assets_keep_their_name() {
        assert_eq!(
            map("https://example.com/img/logo.png"),
            Path::new("out/img/logo.png")
        );
        assert_eq!(map("https://example.com/style.css"), Path::new("out/style.css"));
    }

    #[test]
    fn test_percent_encoding_is_decoded() {
        assert_eq!(
            map("https://example.com/my%20file.pdf"),
            Path::new("out/my file.pdf")
        );
    }

    #[test]
    fn test_illegal_characters_are_replaced() {
        assert_eq!(sanitize_segment("a<b>c"), "a_b_c");
        assert_eq!(sanitize_segment("what?*is|this"), "what_is_this");
        assert_eq!(sanitize_segment("a:::b"), "a_b");
        assert_eq!(sanitize_segment("__a__"), "a");
        assert_eq!(sanitize_segment(". name ."), "name");
    }

    #[test]
    fn test_segment_is_capped_at_255_chars() {
        let long = "é".repeat(300);
        let sanitized = sanitize_segment(&long);
        assert_eq!(sanitized.chars().count(), 255);
    }

    #[test]
    fn test_dot_segments_cannot_escape_root() {
        let path = map("https://example.com/a/%2e%2e/%2e%2e/etc/passwd");
        assert!(path.starts_with("out"));
        assert!(!path.components().any(|c| c.as_os_str() == ".."));
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let url = CanonicalUrl::parse("https://example.com/a/b?x=1").unwrap();
        let first = to_local_path(&url, Path::new("out"));
        for _ in 0..10 {
            assert_eq!(to_local_path(&url, Path::new("out")), first);
        }
    }

    #[test]
    fn test_disambiguate_inserts_hash_before_extension() {
        let url = CanonicalUrl::parse("https://example.com/page?id=2").unwrap();
        let base = map(url.as_str());
        let alt = disambiguate(&base, &url);
        assert_ne!(alt, base);
        assert_eq!(alt.parent(), base.parent());
        let name = alt.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("page-"));
        assert!(name.ends_with(".html"));
        assert_eq!(disambiguate(&base, &url), alt);
    }

    #[test]
    fn test_relative_reference_between_pages() {
        let from = Path::new("out/index.html");
        assert_eq!(relative_reference(from, Path::new("out/about.html")), "about.html");
        assert_eq!(
            relative_reference(from, Path::new("out/img/logo.png")),
            "img/logo.png"
        );

        let nested = Path::new("out/blog/post.html");
        assert_eq!(
            relative_reference(nested, Path::new("out/style.css")),
            "../style.css"
        );
        assert_eq!(
            relative_reference(nested, Path::new("out/blog/other.html")),
            "other.html"
        );
    }

    #[test]
    fn test_relative_reference_encodes_reserved_characters() {
        let from = Path::new("out/index.html");
        assert_eq!(relative_reference(from, Path::new("out/a#b.html")), "a%23b.html");
        assert_eq!(relative_reference(from, Path::new("out/p%41.html")), "p%2541.html");
        assert_eq!(
            relative_reference(from, Path::new("out/my docs/q?.html")),
            "my%20docs/q%3F.html"
        );

        let nested = Path::new("out/blog/post.html");
        assert_eq!(
            relative_reference(nested, Path::new("out/100%.css")),
            "../100%25.css"
        );
    }

    #[test]
    fn test_relative_reference_resolves_to_target() {
        let from = Path::new("out/a/b/page.html");
        let target = Path::new("out/c/d.png");
        let rel = relative_reference(from, target);
        let resolved = from.parent().unwrap().join(&rel);

        let mut normalized = PathBuf::new();
        for component in resolved.components() {
            match component {
                std::path::Component::ParentDir => {
                    normalized.pop();
                }
                other => normalized.push(other),
            }
        }
        assert_eq!(normalized, target);
    }
}

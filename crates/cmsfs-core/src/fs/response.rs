//! Download responses produced by [`crate::File::send_to_browser`].
//!
//! The core library stays free of any HTTP framework: a [`BinaryResponse`]
//! carries the file location and the header values, and the web front end
//! turns it into a streamed response.

use std::path::PathBuf;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// `Cache-Control` value sent with every download.
pub const DOWNLOAD_CACHE_CONTROL: &str = "must-revalidate, post-check=0, pre-check=0";

/// A file delivered as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryResponse {
    /// Absolute path of the file to stream.
    pub path: PathBuf,
    /// Name suggested to the browser, as given by the caller.
    pub filename: String,
    pub content_type: String,
    pub content_length: u64,
}

impl BinaryResponse {
    pub fn attachment(
        path: PathBuf,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content_length: u64,
    ) -> Self {
        Self {
            path,
            filename: filename.into(),
            content_type: content_type.into(),
            content_length,
        }
    }

    /// `Content-Disposition` value with an ASCII-folded filename.
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", ascii_fold(&self.filename))
    }

    /// All response headers, in the order they should be sent.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("content-type", self.content_type.clone()),
            ("content-length", self.content_length.to_string()),
            ("content-disposition", self.content_disposition()),
            ("cache-control", DOWNLOAD_CACHE_CONTROL.to_string()),
            ("connection", "close".to_string()),
        ]
    }
}

/// Folds a filename to printable ASCII for use inside a quoted header value.
///
/// Accents are removed by decomposition; characters without an ASCII base,
/// quotes, backslashes, slashes and percent signs become `_`.
pub fn ascii_fold(name: &str) -> String {
    let folded: String = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            '"' | '\\' | '/' | '%' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();
    if folded.is_empty() {
        "download".to_string()
    } else {
        folded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_fold_strips_accents() {
        assert_eq!(ascii_fold("Übersicht café.pdf"), "Ubersicht cafe.pdf");
    }

    #[test]
    fn ascii_fold_replaces_unmappable_chars() {
        assert_eq!(ascii_fold("日本.txt"), "__.txt");
        assert_eq!(ascii_fold("a\"b\\c/d%e.txt"), "a_b_c_d_e.txt");
    }

    #[test]
    fn ascii_fold_never_returns_empty() {
        assert_eq!(ascii_fold(""), "download");
    }

    #[test]
    fn content_disposition_is_attachment() {
        let resp = BinaryResponse::attachment(
            "/srv/files/r.pdf".into(),
            "Résumé.pdf",
            "application/pdf",
            10,
        );
        assert_eq!(resp.content_disposition(), "attachment; filename=\"Resume.pdf\"");
    }

    #[test]
    fn headers_include_no_cache_directives() {
        let resp = BinaryResponse::attachment("/srv/a.txt".into(), "a.txt", "text/plain", 3);
        let headers = resp.headers();

        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("content-type"), Some("text/plain"));
        assert_eq!(get("content-length"), Some("3"));
        assert_eq!(get("connection"), Some("close"));
        assert_eq!(
            get("cache-control"),
            Some("must-revalidate, post-check=0, pre-check=0")
        );
    }
}

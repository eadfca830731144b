//! Page title forms.
//!
//! The replica database stores titles with underscores, the report and the
//! pageviews `article` field are compared in display form (spaces), and the
//! request path wants underscores again, percent-encoded.

/// Convert a database or API title into display form.
pub fn normalize_title(title: &str) -> String {
    title.replace('_', " ")
}

/// Encode a title for use as a single path segment of a pageviews request.
///
/// Everything outside the RFC 3986 unreserved set is percent-encoded, so
/// slashes and question marks inside titles cannot escape the segment.
pub fn encode_path_title(title: &str) -> String {
    urlencoding::encode(&title.replace(' ', "_")).into_owned()
}

//! Line formats of the BagIt tag files.
//!
//! Pure string functions; no filesystem access. The reader and writer
//! (and the fuzz target) build on these.

use crate::bag::{FetchEntry, Manifest, Metadata};

/// Parse failure with a 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Percent-encode the characters BagIt reserves in manifest and fetch paths.
pub fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '%' => out.push_str("%25"),
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            c => out.push(c),
        }
    }
    out
}

/// Inverse of [`encode_path`]; other `%xx` sequences are left untouched.
pub fn decode_path(encoded: &str) -> String {
    encoded
        .replace("%0A", "\n")
        .replace("%0a", "\n")
        .replace("%0D", "\r")
        .replace("%0d", "\r")
        .replace("%25", "%")
}

/// Parse `Label: Value` lines with indented continuation lines.
pub fn parse_tag_lines(text: &str) -> Result<Vec<(String, String)>, ParseError> {
    let mut out: Vec<(String, String)> = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        if raw.trim().is_empty() {
            continue;
        }
        if raw.starts_with(' ') || raw.starts_with('\t') {
            let Some((_, value)) = out.last_mut() else {
                return Err(ParseError::new(line_no, "continuation line without a label"));
            };
            value.push(' ');
            value.push_str(raw.trim());
            continue;
        }
        let Some((label, value)) = raw.split_once(':') else {
            return Err(ParseError::new(line_no, "expected `Label: Value`"));
        };
        let label = label.trim();
        if label.is_empty() {
            return Err(ParseError::new(line_no, "empty label"));
        }
        out.push((label.to_string(), value.trim().to_string()));
    }
    Ok(out)
}

/// `bagit.txt`.
pub fn render_declaration(version: &str, encoding: &str) -> String {
    format!(
        "BagIt-Version: {}\nTag-File-Character-Encoding: {}\n",
        version, encoding
    )
}

/// Parse `bagit.txt` into `(version, encoding)`.
pub fn parse_declaration(text: &str) -> Result<(String, String), ParseError> {
    let lines = parse_tag_lines(text)?;
    let find = |label: &str| {
        lines
            .iter()
            .find(|(k, _)| k == label)
            .map(|(_, v)| v.clone())
    };
    let version = find("BagIt-Version").ok_or_else(|| ParseError::new(1, "missing BagIt-Version"))?;
    let encoding = find("Tag-File-Character-Encoding")
        .ok_or_else(|| ParseError::new(2, "missing Tag-File-Character-Encoding"))?;
    Ok((version, encoding))
}

/// `bag-info.txt`, in insertion order.
pub fn render_metadata(metadata: &Metadata) -> String {
    let mut out = String::new();
    for (key, value) in metadata.iter() {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&value.replace('\n', " ").replace('\r', ""));
        out.push('\n');
    }
    out
}

pub fn parse_metadata(text: &str) -> Result<Metadata, ParseError> {
    let mut metadata = Metadata::new();
    for (k, v) in parse_tag_lines(text)? {
        metadata.add(k, v);
    }
    Ok(metadata)
}

/// `<checksum>  <path>` per entry, sorted by path.
pub fn render_manifest(manifest: &Manifest) -> String {
    let mut out = String::new();
    for (path, checksum) in &manifest.entries {
        out.push_str(checksum);
        out.push_str("  ");
        out.push_str(&encode_path(path.as_str()));
        out.push('\n');
    }
    out
}

/// Parse manifest lines into `(checksum, decoded path)` pairs.
pub fn parse_manifest(text: &str) -> Result<Vec<(String, String)>, ParseError> {
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let Some((checksum, path)) = line.split_once(char::is_whitespace) else {
            return Err(ParseError::new(idx + 1, "expected `<checksum> <path>`"));
        };
        let path = path.trim_start();
        if checksum.is_empty() || path.is_empty() {
            return Err(ParseError::new(idx + 1, "expected `<checksum> <path>`"));
        }
        if !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseError::new(idx + 1, "checksum is not hexadecimal"));
        }
        out.push((checksum.to_ascii_lowercase(), decode_path(path)));
    }
    Ok(out)
}

/// `<url> <length|-> <path>` per entry, in admission order.
pub fn render_fetch(entries: &[FetchEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        let length = e
            .length
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{} {} {}\n",
            e.url,
            length,
            encode_path(e.path.as_str())
        ));
    }
    out
}

/// One parsed `fetch.txt` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchLine {
    pub url: String,
    pub length: Option<u64>,
    pub path: String,
}

pub fn parse_fetch(text: &str) -> Result<Vec<FetchLine>, ParseError> {
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.splitn(3, char::is_whitespace);
        let (Some(url), Some(length), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseError::new(idx + 1, "expected `<url> <length> <path>`"));
        };
        let length = match length {
            "-" => None,
            n => Some(
                n.parse::<u64>()
                    .map_err(|_| ParseError::new(idx + 1, format!("invalid length {:?}", n)))?,
            ),
        };
        let path = path.trim_start();
        if url.is_empty() || path.is_empty() {
            return Err(ParseError::new(idx + 1, "expected `<url> <length> <path>`"));
        }
        out.push(FetchLine {
            url: url.to_string(),
            length,
            path: decode_path(path),
        });
    }
    Ok(out)
}

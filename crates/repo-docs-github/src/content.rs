use base64::Engine;
use repo_docs::{FetchError, RemoteFileMeta};
use serde::Deserialize;

/// Body of GitHub's Contents API.
/// `GET /repos/{owner}/{repo}/contents/{path}?ref={branch}`
///
/// A file comes back as an object; a directory as a list of entries.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContentsBody {
    Directory(Vec<serde_json::Value>),
    File(ContentResponse),
}

#[derive(Debug, Deserialize)]
pub struct ContentResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub size: u64,
    pub download_url: Option<String>,
    #[serde(rename = "type", default = "default_entry_type")]
    pub entry_type: String,
    pub content: Option<String>,
    pub encoding: Option<String>,
}

fn default_entry_type() -> String {
    "file".into()
}

/// Decoded file text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedContent {
    pub text: String,
    /// Set when the bytes were not valid UTF-8 and were read as Latin-1.
    pub lossy: bool,
}

impl ContentResponse {
    pub fn remote_meta(&self) -> RemoteFileMeta {
        RemoteFileMeta {
            sha: self.sha.clone(),
            size: self.size,
            download_url: self.download_url.clone(),
            entry_type: self.entry_type.clone(),
        }
    }

    /// Decode the base64 body. Bytes that are not UTF-8 still produce text.
    pub fn decode(&self) -> Result<DecodedContent, FetchError> {
        if self.encoding.as_deref() != Some("base64") {
            return Err(FetchError::UnsupportedEncoding(self.encoding.clone()));
        }

        let encoded = self
            .content
            .as_deref()
            .ok_or_else(|| FetchError::InvalidResponse("no content in response".into()))?;

        // GitHub returns base64 with newlines embedded
        let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&cleaned)
            .map_err(|e| FetchError::InvalidResponse(format!("base64 decode failed: {e}")))?;

        Ok(match String::from_utf8(bytes) {
            Ok(text) => DecodedContent { text, lossy: false },
            Err(e) => DecodedContent {
                text: latin1(e.as_bytes()),
                lossy: true,
            },
        })
    }
}

/// Every byte maps to the code point of the same value, so this never fails.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content: Option<&str>, encoding: Option<&str>) -> ContentResponse {
        ContentResponse {
            name: "a.md".into(),
            path: "docs/a.md".into(),
            sha: "abc".into(),
            size: 5,
            download_url: Some("https://raw.example/a.md".into()),
            entry_type: "file".into(),
            content: content.map(str::to_owned),
            encoding: encoding.map(str::to_owned),
        }
    }

    #[test]
    fn decodes_base64_with_line_breaks() {
        // "hello world" split across lines the way GitHub wraps it
        let decoded = file(Some("aGVsbG8g\nd29ybGQ=\n"), Some("base64"))
            .decode()
            .unwrap();
        assert_eq!(decoded.text, "hello world");
        assert!(!decoded.lossy);
    }

    #[test]
    fn falls_back_to_latin1_for_invalid_utf8() {
        // 0x63 0x61 0x66 0xE9 = "café" in Latin-1, invalid as UTF-8
        let decoded = file(Some("Y2Fm6Q=="), Some("base64")).decode().unwrap();
        assert_eq!(decoded.text, "café");
        assert!(decoded.lossy);
    }

    #[test]
    fn rejects_other_encodings() {
        assert_eq!(
            file(Some(""), Some("none")).decode(),
            Err(FetchError::UnsupportedEncoding(Some("none".into())))
        );
        assert_eq!(
            file(Some("x"), None).decode(),
            Err(FetchError::UnsupportedEncoding(None))
        );
    }

    #[test]
    fn invalid_base64_is_an_invalid_response() {
        let result = file(Some("!!!not base64!!!"), Some("base64")).decode();
        assert!(matches!(result, Err(FetchError::InvalidResponse(_))));
    }

    #[test]
    fn missing_content_is_an_invalid_response() {
        let result = file(None, Some("base64")).decode();
        assert!(matches!(result, Err(FetchError::InvalidResponse(_))));
    }

    #[test]
    fn directory_listing_parses_as_directory() {
        let body: ContentsBody =
            serde_json::from_str(r#"[{"name":"a.md","type":"file"},{"name":"b","type":"dir"}]"#)
                .unwrap();
        assert!(matches!(body, ContentsBody::Directory(entries) if entries.len() == 2));
    }

    #[test]
    fn file_object_parses_with_defaults() {
        let body: ContentsBody =
            serde_json::from_str(r#"{"content":"aGk=","encoding":"base64"}"#).unwrap();
        let ContentsBody::File(file) = body else {
            panic!("expected a file");
        };
        assert_eq!(file.entry_type, "file");
        assert_eq!(file.size, 0);
        assert_eq!(file.remote_meta().download_url, None);
        assert_eq!(file.decode().unwrap().text, "hi");
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Whether an ownership (WHOIS) record could be retrieved for the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhoIs {
    Complete,
    Incomplete,
}

impl WhoIs {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhoIs::Complete => "complete",
            WhoIs::Incomplete => "incomplete",
        }
    }
}

/// Whether the URL uses the `https` scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Https {
    Yes,
    No,
}

impl Https {
    pub fn as_str(&self) -> &'static str {
        match self {
            Https::Yes => "yes",
            Https::No => "no",
        }
    }
}

/// Classification label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Good,
    Bad,
}

impl Label {
    /// Binary class index: `good` is 0, `bad` is 1
    pub fn class_index(&self) -> u8 {
        match self {
            Label::Good => 0,
            Label::Bad => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Good => "good",
            Label::Bad => "bad",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-schema signals extracted for a single URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Raw URL, before normalization
    pub url: String,

    /// Character length of the raw URL
    pub url_len: u64,

    /// Resolved address, empty when resolution failed
    pub ip_address: String,

    /// Country of the resolved address, `Unknown` when not available
    pub geo_loc: String,

    /// Last dot-separated label of the host
    pub tld: String,

    pub who_is: WhoIs,

    pub https: Https,

    /// Lines of inline and external script
    pub js_len: u64,

    /// Reserved, always 0
    pub js_obf_len: u64,

    /// Page text with stopwords removed
    pub content: String,

    /// Known for training rows only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
}

/// Label as stored in the corpus: a `good`/`bad` string, or an already
/// encoded class index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLabel {
    Encoded(u8),
    Text(String),
}

impl From<Label> for RawLabel {
    fn from(label: Label) -> Self {
        RawLabel::Text(label.as_str().to_string())
    }
}

/// Document form of a feature record in the `train` and `test` collections.
///
/// Documents are schemaless, so every field may be missing. Unknown fields are
/// kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusRow {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub url_len: Option<u64>,

    #[serde(rename = "ip_add", default)]
    pub ip_address: Option<String>,

    #[serde(default)]
    pub geo_loc: Option<String>,

    #[serde(default)]
    pub tld: Option<String>,

    #[serde(default)]
    pub who_is: Option<String>,

    #[serde(default)]
    pub https: Option<String>,

    #[serde(default)]
    pub js_len: Option<u64>,

    #[serde(default)]
    pub js_obf_len: Option<u64>,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub label: Option<RawLabel>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CorpusRow {
    /// Build the document written back after a live prediction
    pub fn from_feedback(record: &FeatureRecord, predicted: Label) -> Self {
        Self {
            js_obf_len: Some(0),
            label: Some(predicted.into()),
            ..Self::from(record)
        }
    }
}

impl From<&FeatureRecord> for CorpusRow {
    fn from(record: &FeatureRecord) -> Self {
        Self {
            id: None,
            url: Some(record.url.clone()),
            url_len: Some(record.url_len),
            ip_address: Some(record.ip_address.clone()),
            geo_loc: Some(record.geo_loc.clone()),
            tld: Some(record.tld.clone()),
            who_is: Some(record.who_is.as_str().to_string()),
            https: Some(record.https.as_str().to_string()),
            js_len: Some(record.js_len),
            js_obf_len: Some(record.js_obf_len),
            content: Some(record.content.clone()),
            label: record.label.map(RawLabel::from),
            extra: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> FeatureRecord {
        FeatureRecord {
            url: "https://example.com/".to_string(),
            url_len: 20,
            ip_address: "93.184.216.34".to_string(),
            geo_loc: "United States".to_string(),
            tld: "com".to_string(),
            who_is: WhoIs::Complete,
            https: Https::Yes,
            js_len: 12,
            js_obf_len: 0,
            content: "example domain".to_string(),
            label: None,
        }
    }

    #[test]
    fn test_label_class_index() {
        assert_eq!(Label::Good.class_index(), 0);
        assert_eq!(Label::Bad.class_index(), 1);
    }

    #[test]
    fn test_raw_label_accepts_text_and_codes() {
        let text: RawLabel = serde_json::from_value(json!("bad")).unwrap();
        assert_eq!(text, RawLabel::Text("bad".to_string()));

        let code: RawLabel = serde_json::from_value(json!(0)).unwrap();
        assert_eq!(code, RawLabel::Encoded(0));
    }

    #[test]
    fn test_corpus_row_document_shape() {
        let row = CorpusRow::from_feedback(&record(), Label::Bad);
        let doc = serde_json::to_value(&row).unwrap();

        assert_eq!(doc["ip_add"], "93.184.216.34");
        assert_eq!(doc["label"], "bad");
        assert_eq!(doc["js_obf_len"], 0);
        assert_eq!(doc["who_is"], "complete");
        assert!(doc.get("_id").is_none());
    }

    #[test]
    fn test_corpus_row_keeps_unknown_fields() {
        let doc = json!({
            "_id": "abc",
            "url": "example.com",
            "label": "good",
            "page_rank": 3.5
        });

        let row: CorpusRow = serde_json::from_value(doc).unwrap();
        assert_eq!(row.id.as_deref(), Some("abc"));
        assert!(row.url_len.is_none());
        assert_eq!(row.extra.get("page_rank"), Some(&json!(3.5)));
    }
}

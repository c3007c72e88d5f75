use crate::error::{AppError, Result};
use crate::ml::models::{LabeledRow, ModelInput};
use crate::models::{CorpusRow, RawLabel};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// A corpus row with every required field present, before normalization
#[derive(Debug, Clone, PartialEq, Serialize)]
struct CompleteRow {
    url: String,
    url_len: u64,
    geo_loc: String,
    tld: String,
    who_is: String,
    https: String,
    js_len: u64,
    content: String,
    label: RawLabel,
}

impl CompleteRow {
    /// Keep the fields an extracted record can supply; `None` when one is missing.
    ///
    /// Identifier, address and placeholder columns go, and so does any field
    /// outside the record schema: a live prediction row never carries one.
    fn from_corpus(row: CorpusRow) -> Option<Self> {
        let CorpusRow {
            id: _,
            url,
            url_len,
            ip_address: _,
            geo_loc,
            tld,
            who_is,
            https,
            js_len,
            js_obf_len: _,
            content,
            label,
            extra: _,
        } = row;

        Some(Self {
            url: url?,
            url_len: url_len?,
            geo_loc: geo_loc?,
            tld: tld?,
            who_is: who_is?,
            https: https?,
            js_len: js_len?,
            content: content?,
            label: label?,
        })
    }

    fn dedup_key(&self) -> Result<String> {
        serde_json::to_string(self).map_err(AppError::from)
    }
}

/// Map a stored label onto its binary class
pub fn encode_label(label: &RawLabel) -> Result<u8> {
    match label {
        RawLabel::Text(text) if text == "good" => Ok(0),
        RawLabel::Text(text) if text == "bad" => Ok(1),
        RawLabel::Encoded(code @ (0 | 1)) => Ok(*code),
        other => Err(AppError::Preprocessing(format!(
            "unrecognised label {:?}",
            other
        ))),
    }
}

/// Clean and label a batch of corpus rows for fitting.
///
/// Steps, in order: drop `_id`/`ip_add`/`js_obf_len` and fields outside the
/// record schema, drop incomplete rows,
/// drop exact duplicates, normalize `content` and `url`, encode the label.
/// Any error aborts the whole batch.
pub fn preprocess(rows: Vec<CorpusRow>) -> Result<Vec<LabeledRow>> {
    let n_input = rows.len();

    let complete: Vec<CompleteRow> = rows.into_iter().filter_map(CompleteRow::from_corpus).collect();
    let n_complete = complete.len();

    let mut seen = HashSet::with_capacity(n_complete);
    let mut unique = Vec::with_capacity(n_complete);
    for row in complete {
        if seen.insert(row.dedup_key()?) {
            unique.push(row);
        }
    }

    debug!(
        input = n_input,
        incomplete = n_input - n_complete,
        duplicates = n_complete - unique.len(),
        "Dropped unusable rows"
    );

    let labeled = unique
        .into_iter()
        .map(|row| {
            let label = encode_label(&row.label)?;
            let input = ModelInput::normalized(
                &row.url,
                row.url_len,
                &row.geo_loc,
                &row.tld,
                &row.who_is,
                &row.https,
                row.js_len,
                &row.content,
            );
            Ok(LabeledRow { input, label })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(input = n_input, output = labeled.len(), "Preprocessed batch");

    Ok(labeled)
}

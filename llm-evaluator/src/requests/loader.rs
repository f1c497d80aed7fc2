//! Batch request loading from CSV and JSON files

use serde::Deserialize;
use std::path::Path;

use super::{EvaluationRequest, RawEvaluationRequest, RequestError};

/// Error type for batch loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Row {row}: {source}")]
    Request {
        row: usize,
        #[source]
        source: RequestError,
    },

    #[error("Unsupported batch file format: {0}")]
    UnsupportedFormat(String),
}

/// Load requests from a `.csv` or `.json` file
pub fn load_requests_from_file(path: impl AsRef<Path>) -> Result<Vec<EvaluationRequest>, LoadError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let content = match ext.as_str() {
        "csv" | "json" => std::fs::read_to_string(path)?,
        _ => return Err(LoadError::UnsupportedFormat(path.display().to_string())),
    };

    let requests = if ext == "csv" {
        load_requests_from_csv(&content)?
    } else {
        load_requests_from_json(&content)?
    };
    tracing::info!("Loaded {} evaluation requests from {}", requests.len(), path.display());
    Ok(requests)
}

/// Parse CSV with a header row naming the request fields.
///
/// Cells are trimmed and whitespace-only lines are skipped. Rows are
/// numbered from 1, not counting the header.
pub fn load_requests_from_csv(content: &str) -> Result<Vec<EvaluationRequest>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();

    let mut requests = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let raw: RawEvaluationRequest = record.deserialize(Some(&headers))?;
        let request = raw
            .validate()
            .map_err(|source| LoadError::Request { row: idx + 1, source })?;
        requests.push(request);
    }

    Ok(requests)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonBatch {
    Wrapped { evaluations: Vec<RawEvaluationRequest> },
    Bare(Vec<RawEvaluationRequest>),
}

/// Parse `{"evaluations": [...]}` or a bare JSON array of requests
pub fn load_requests_from_json(content: &str) -> Result<Vec<EvaluationRequest>, LoadError> {
    let raw = match serde_json::from_str::<JsonBatch>(content)? {
        JsonBatch::Wrapped { evaluations } => evaluations,
        JsonBatch::Bare(items) => items,
    };

    raw.into_iter()
        .enumerate()
        .map(|(idx, r)| {
            r.validate()
                .map_err(|source| LoadError::Request { row: idx + 1, source })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "model,temperature,max_new_tokens,prompt,criteria,iterations,expected_result";

    #[test]
    fn test_csv_with_indented_rows() {
        let csv = format!(
            "{}\n    llama_3_8b,0.5,100,Write a poem about the sea.,Score 10: Perfect. Score 1: Bad.,1,A beautiful poem about the sea.\n    \n",
            HEADER
        );
        let requests = load_requests_from_csv(&csv).unwrap();
        assert_eq!(requests.len(), 1);
        let r = &requests[0];
        assert_eq!(r.model, "llama_3_8b");
        assert_eq!(r.temperature, 0.5);
        assert_eq!(r.max_new_tokens, 100);
        assert_eq!(r.prompt, "Write a poem about the sea.");
        assert_eq!(r.criteria, "Score 10: Perfect. Score 1: Bad.");
        assert_eq!(r.expected_result, "A beautiful poem about the sea.");
    }

    #[test]
    fn test_csv_quoted_commas() {
        let csv = format!(
            "{}\ngpt_4,0.2,50,\"Hello, world\",\"Score 10: great, Score 1: bad\",3,\"Hi, there\"\n",
            HEADER
        );
        let requests = load_requests_from_csv(&csv).unwrap();
        assert_eq!(requests[0].prompt, "Hello, world");
        assert_eq!(requests[0].iterations, 3);
    }

    #[test]
    fn test_csv_missing_cell_names_row_and_field() {
        let csv = format!("{}\ngpt_4,0.2,50,p,c,1,e\ngpt_4,0.2,50,p,c,,e\n", HEADER);
        let err = load_requests_from_csv(&csv).unwrap_err();
        match err {
            LoadError::Request { row, source } => {
                assert_eq!(row, 2);
                assert_eq!(source, RequestError::MissingField("iterations"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_csv_bad_number_is_csv_error() {
        let csv = format!("{}\ngpt_4,warm,50,p,c,1,e\n", HEADER);
        assert!(matches!(load_requests_from_csv(&csv), Err(LoadError::Csv(_))));
    }

    #[test]
    fn test_json_wrapped_and_bare() {
        let item = r#"{"model":"gpt_4o","temperature":0.1,"max_new_tokens":10,"prompt":"p","criteria":"c","iterations":2,"expected_result":"e"}"#;
        let wrapped = format!(r#"{{"evaluations":[{}]}}"#, item);
        let bare = format!("[{}, {}]", item, item);
        assert_eq!(load_requests_from_json(&wrapped).unwrap().len(), 1);
        assert_eq!(load_requests_from_json(&bare).unwrap().len(), 2);
    }

    #[test]
    fn test_json_missing_field() {
        let json = r#"[{"model":"gpt_4o"}]"#;
        assert!(matches!(
            load_requests_from_json(json),
            Err(LoadError::Request { row: 1, source: RequestError::MissingField("temperature") })
        ));
    }

    #[test]
    fn test_file_dispatch_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("batch.csv");
        std::fs::write(&csv_path, format!("{}\ngpt_4,0.2,50,p,c,1,e\n", HEADER)).unwrap();
        assert_eq!(load_requests_from_file(&csv_path).unwrap().len(), 1);

        let txt_path = dir.path().join("batch.txt");
        std::fs::write(&txt_path, "nothing").unwrap();
        assert!(matches!(
            load_requests_from_file(&txt_path),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }
}

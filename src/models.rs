use serde::Deserialize;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Entry id or exhibit label as it appears in a record: either a number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Number(n) => write!(f, "{}", n),
            Identifier::Text(s) => f.write_str(s),
        }
    }
}

/// One structured input document, e.g. one docket.
#[derive(Debug, Clone)]
pub struct Record {
    /// Derived from the source file name with the extension stripped
    pub id: String,
    pub entries: Vec<Entry>,
}

/// On-disk shape of a record. Docket API exports name the list `docket_report`.
#[derive(Debug, Deserialize)]
struct RecordDocument {
    #[serde(default, alias = "docket_report")]
    entries: Option<Vec<Entry>>,
}

impl Record {
    pub fn from_json(id: impl Into<String>, json: &str) -> Result<Self, serde_json::Error> {
        let document: RecordDocument = serde_json::from_str(json)?;
        Ok(Record {
            id: id.into(),
            entries: document.entries.unwrap_or_default(),
        })
    }
}

/// One line item within a record, e.g. one docket filing.
#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    #[serde(alias = "number")]
    pub id: Identifier,

    #[serde(default, alias = "contents")]
    pub content: Option<String>,

    #[serde(default)]
    pub link: Option<String>,

    #[serde(default)]
    pub exhibits: Option<Vec<Exhibit>>,
}

/// A sub-attachment of an entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Exhibit {
    #[serde(default, rename = "exhibit")]
    pub label: Option<Identifier>,

    #[serde(default)]
    pub link: Option<String>,
}

/// One unit of download work.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTask {
    pub url: String,
    /// Sanitized base name, without the `.pdf` extension
    pub filename: String,
    /// Record identifier; names the per-record output folder
    pub subfolder: String,
    /// Matter/billing code sent along with authenticated requests
    pub client_matter: Option<String>,
}

impl DownloadTask {
    pub fn directory(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.subfolder)
    }

    pub fn destination(&self, output_root: &Path) -> PathBuf {
        self.directory(output_root)
            .join(format!("{}.pdf", self.filename))
    }

    /// True when the destination sits exactly one folder below the output root
    pub fn is_contained(&self) -> bool {
        is_single_component(&self.subfolder) && is_single_component(&format!("{}.pdf", self.filename))
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

/// Result of fetching a single task. Failures never escape as errors.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Downloaded { path: PathBuf },
    Failed { cause: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Downloaded { .. })
    }
}

/// Terminal report of one bulk run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: uuid::Uuid,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Tasks never dispatched because the run was cancelled
    pub not_started: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
    pub report_path: PathBuf,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(subfolder: &str, filename: &str) -> DownloadTask {
        DownloadTask {
            url: "http://x/a.pdf".to_string(),
            filename: filename.to_string(),
            subfolder: subfolder.to_string(),
            client_matter: None,
        }
    }

    #[test]
    fn test_task_containment() {
        assert!(task("123", "7 - Order_Granted").is_contained());
        assert!(task("Smith v Jones", "..x - Order").is_contained());
        assert!(!task("123", "../../etc/x").is_contained());
        assert!(!task("123", "A/B").is_contained());
        assert!(!task("..", "doc").is_contained());
        assert!(!task("a/b", "doc").is_contained());
        assert!(!task("", "doc").is_contained());
        assert!(!task("/abs", "doc").is_contained());
        assert!(!task("123", "a\\b").is_contained());
    }

    #[test]
    fn test_identifier_display() {
        let number: Identifier = serde_json::from_str("7").unwrap();
        let text: Identifier = serde_json::from_str("\"12-A\"").unwrap();
        assert_eq!(number.to_string(), "7");
        assert_eq!(text.to_string(), "12-A");
    }

    #[test]
    fn test_record_accepts_docket_report_aliases() {
        let json = r#"{
            "success": true,
            "docket_report": [
                {"number": 3, "contents": "Motion", "link": "http://x/m.pdf",
                 "exhibits": [{"exhibit": 1, "link": "http://x/e1.pdf"}, {"exhibit": 2}]}
            ]
        }"#;
        let record = Record::from_json("case", json).unwrap();
        assert_eq!(record.id, "case");
        assert_eq!(record.entries.len(), 1);
        let entry = &record.entries[0];
        assert_eq!(entry.id.to_string(), "3");
        assert_eq!(entry.content.as_deref(), Some("Motion"));
        let exhibits = entry.exhibits.as_ref().unwrap();
        assert_eq!(exhibits.len(), 2);
        assert!(exhibits[1].link.is_none());
    }

    #[test]
    fn test_record_without_entries_is_empty() {
        let record = Record::from_json("empty", r#"{"info": {"title": "x"}}"#).unwrap();
        assert!(record.entries.is_empty());
    }

    #[test]
    fn test_record_with_null_fields() {
        let json = r#"{"entries": [{"id": "9", "content": null, "link": null, "exhibits": null}]}"#;
        let record = Record::from_json("r", json).unwrap();
        assert!(record.entries[0].content.is_none());
        assert!(record.entries[0].link.is_none());
    }

    #[test]
    fn test_task_destination() {
        let task = DownloadTask {
            url: "http://x/a.pdf".to_string(),
            filename: "7 - Order_Granted".to_string(),
            subfolder: "123".to_string(),
            client_matter: None,
        };
        assert_eq!(
            task.destination(Path::new("/out")),
            PathBuf::from("/out/123/7 - Order_Granted.pdf")
        );
    }
}

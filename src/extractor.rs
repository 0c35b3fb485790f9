//! Link extraction from a directory of record files

use crate::errors::BulkError;
use crate::models::{DownloadTask, Record};
use crate::sanitize::{path_component, sanitize};
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Walks a records directory and turns every link into a [`DownloadTask`]
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    extension: String,
    client_matter: Option<String>,
}

impl Default for LinkExtractor {
    fn default() -> Self {
        Self::new("json")
    }
}

impl LinkExtractor {
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
            client_matter: None,
        }
    }

    pub fn with_client_matter(mut self, client_matter: Option<String>) -> Self {
        self.client_matter = client_matter;
        self
    }

    /// Extract tasks from every record file directly inside `dir`.
    ///
    /// Files are visited in name order. A missing directory, an unreadable
    /// file or a file that does not parse aborts extraction with an error
    /// naming the file.
    pub fn extract(&self, dir: &Path) -> Result<Vec<DownloadTask>, BulkError> {
        if !dir.is_dir() {
            return Err(BulkError::InputDirectoryMissing(dir.to_path_buf()));
        }

        let mut tasks = Vec::new();
        let mut records = 0;

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                BulkError::RecordRead {
                    path,
                    source: e.into(),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            let Some(record_id) = self.record_id(&file_name) else {
                continue;
            };

            let path = entry.path();
            let json = std::fs::read_to_string(path).map_err(|source| BulkError::RecordRead {
                path: path.to_path_buf(),
                source,
            })?;
            let record =
                Record::from_json(record_id, &json).map_err(|source| BulkError::MalformedRecord {
                    path: path.to_path_buf(),
                    source,
                })?;

            let before = tasks.len();
            self.collect_tasks(&record, &mut tasks);
            debug!(
                record = %record.id,
                links = tasks.len() - before,
                "Extracted links from record"
            );
            records += 1;
        }

        info!("Extracted {} links from {} records", tasks.len(), records);
        Ok(tasks)
    }

    /// File name minus the record extension, or `None` for non-record files
    fn record_id(&self, file_name: &str) -> Option<String> {
        let suffix_len = self.extension.len() + 1;
        if file_name.len() <= suffix_len || !file_name.is_char_boundary(file_name.len() - suffix_len) {
            return None;
        }
        let (stem, suffix) = file_name.split_at(file_name.len() - suffix_len);
        let matches = suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(&self.extension);
        // a stem of only dots would name the output root or its parent
        (matches && !path_component(stem).is_empty()).then(|| stem.to_string())
    }

    fn collect_tasks(&self, record: &Record, tasks: &mut Vec<DownloadTask>) {
        for entry in &record.entries {
            // Only the description is capped; prefixes can push a name past the
            // 255-byte component limit, which then fails as that task's write error.
            let description = sanitize(entry.content.as_deref().unwrap_or_default());
            let id = path_component(&entry.id.to_string());
            let entry_name = format!("{} - {}", id, description);

            if let Some(link) = &entry.link {
                tasks.push(self.task(link, entry_name.clone(), &record.id));
            }

            for exhibit in entry.exhibits.iter().flatten() {
                let Some(link) = &exhibit.link else {
                    continue;
                };
                let label = exhibit
                    .label
                    .as_ref()
                    .map(|label| path_component(&label.to_string()))
                    .unwrap_or_default();
                tasks.push(self.task(link, format!("Exhibit {} - {}", label, entry_name), &record.id));
            }
        }
    }

    fn task(&self, url: &str, filename: String, subfolder: &str) -> DownloadTask {
        DownloadTask {
            url: url.to_string(),
            filename,
            subfolder: subfolder.to_string(),
            client_matter: self.client_matter.clone(),
        }
    }
}

/// Extract with the default `.json` record extension
pub fn extract(dir: &Path) -> Result<Vec<DownloadTask>, BulkError> {
    LinkExtractor::default().extract(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) {
        fs::write(dir.path().join(name), contents).unwrap();
    }

    fn two_link_record(n: usize) -> String {
        format!(
            r#"{{"entries": [
                {{"id": {n}, "content": "Complaint {n}", "link": "http://x/{n}/c.pdf"}},
                {{"id": "{n}b", "content": "Motion", "exhibits": [{{"exhibit": "A", "link": "http://x/{n}/e.pdf"}}]}}
            ]}}"#
        )
    }

    #[test]
    fn test_single_record_scenario() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "123.json",
            r#"{"entries":[{"id":"7","content":"Order <b>Granted</b>","link":"http://x/a.pdf"}]}"#,
        );

        let tasks = extract(dir.path()).unwrap();
        assert_eq!(
            tasks,
            vec![DownloadTask {
                url: "http://x/a.pdf".to_string(),
                filename: "7 - Order_Granted".to_string(),
                subfolder: "123".to_string(),
                client_matter: None,
            }]
        );
    }

    #[test]
    fn test_two_tasks_per_record_in_order() {
        let dir = TempDir::new().unwrap();
        for n in 1..=3 {
            write(&dir, &format!("docket-{}.json", n), &two_link_record(n));
        }

        let tasks = extract(dir.path()).unwrap();
        assert_eq!(tasks.len(), 6);

        let urls: Vec<_> = tasks.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "http://x/1/c.pdf",
                "http://x/1/e.pdf",
                "http://x/2/c.pdf",
                "http://x/2/e.pdf",
                "http://x/3/c.pdf",
                "http://x/3/e.pdf",
            ]
        );
        assert_eq!(tasks[0].filename, "1 - Complaint_1");
        assert_eq!(tasks[1].filename, "Exhibit A - 1b - Motion");
        assert_eq!(tasks[1].subfolder, "docket-1");
    }

    #[test]
    fn test_direct_link_precedes_exhibits() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "r.json",
            r#"{"entries": [{"id": 4, "content": "Brief", "link": "http://x/brief.pdf",
                "exhibits": [{"exhibit": 1, "link": "http://x/e1.pdf"},
                             {"exhibit": 2},
                             {"exhibit": 3, "link": "http://x/e3.pdf"}]}]}"#,
        );

        let names: Vec<_> = extract(dir.path())
            .unwrap()
            .into_iter()
            .map(|t| t.filename)
            .collect();
        assert_eq!(
            names,
            vec!["4 - Brief", "Exhibit 1 - 4 - Brief", "Exhibit 3 - 4 - Brief"]
        );
    }

    #[test]
    fn test_entries_without_links_contribute_nothing() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "r.json",
            r#"{"entries": [{"id": 1, "content": "Minute entry"},
                            {"id": 2, "content": "Notice", "exhibits": []}]}"#,
        );
        write(&dir, "no-entries.json", r#"{"case": "empty"}"#);

        assert!(extract(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        write(&dir, "UPPER.JSON", &two_link_record(1));
        write(&dir, "notes.txt", "not a record");
        write(&dir, "json", "no stem");
        fs::create_dir(dir.path().join("nested.json")).unwrap();

        let tasks = extract(dir.path()).unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.subfolder == "UPPER"));
    }

    #[test]
    fn test_custom_extension_and_client_matter() {
        let dir = TempDir::new().unwrap();
        write(&dir, "case.docket", &two_link_record(1));
        write(&dir, "case.json", &two_link_record(2));

        let tasks = LinkExtractor::new(".docket")
            .with_client_matter(Some("M-100".to_string()))
            .extract(dir.path())
            .unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.subfolder == "case"));
        assert!(tasks
            .iter()
            .all(|t| t.client_matter.as_deref() == Some("M-100")));
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            extract(&missing),
            Err(BulkError::InputDirectoryMissing(path)) if path == missing
        ));
    }

    #[test]
    fn test_malformed_record_fails_loudly() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a-good.json", &two_link_record(1));
        write(&dir, "b-bad.json", r#"{"entries": [{"id": 1, "link": "#);

        match extract(dir.path()) {
            Err(BulkError::MalformedRecord { path, .. }) => {
                assert!(path.ends_with("b-bad.json"))
            }
            other => panic!("expected malformed record error, got {:?}", other),
        }
    }

    #[test]
    fn test_identifiers_cannot_escape_record_folder() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "r.json",
            r#"{"entries": [{"id": "../x", "content": "Order", "link": "http://x/1.pdf",
                "exhibits": [{"exhibit": "A/B", "link": "http://x/2.pdf"},
                             {"exhibit": "..", "link": "http://x/3.pdf"}]}]}"#,
        );
        write(&dir, "...json", &two_link_record(1));

        let tasks = extract(dir.path()).unwrap();
        let names: Vec<_> = tasks.iter().map(|t| t.filename.as_str()).collect();
        assert_eq!(
            names,
            vec!["..x - Order", "Exhibit AB - ..x - Order", "Exhibit  - ..x - Order"]
        );

        let root = Path::new("/out");
        for task in &tasks {
            assert_eq!(task.subfolder, "r");
            let destination = task.destination(root);
            assert_eq!(destination.parent(), Some(root.join("r").as_path()));
        }
    }

    #[test]
    fn test_long_names_keep_prefixes_beyond_the_cap() {
        let dir = TempDir::new().unwrap();
        let content = "word ".repeat(100);
        write(
            &dir,
            "r.json",
            &format!(
                r#"{{"entries": [{{"id": 12, "content": "{content}",
                    "exhibits": [{{"exhibit": "A", "link": "http://x/e.pdf"}}]}}]}}"#
            ),
        );

        let tasks = extract(dir.path()).unwrap();
        let name = &tasks[0].filename;
        assert!(name.starts_with("Exhibit A - 12 - word_word"));
        assert_eq!(
            name.chars().count(),
            "Exhibit A - 12 - ".len() + crate::sanitize::MAX_NAME_CHARS
        );
    }

    #[test]
    fn test_entries_of_wrong_type_are_malformed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "r.json", r#"{"entries": "not a list"}"#);
        assert!(matches!(
            extract(dir.path()),
            Err(BulkError::MalformedRecord { .. })
        ));
    }
}

//! The append-only per-server operation log: one `LOAN`/`QUERY <count>`
//! line per request, plus the response text when any book matched.

use std::fs::File;
use std::io::Write;
use std::sync::Mutex;

pub struct OperationLog {
    file: Mutex<File>,
}

impl OperationLog {
    pub fn create(path: &str) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(OperationLog {
            file: Mutex::new(file),
        })
    }

    /// Appends one operation record. `kind` is `"LOAN"` or `"QUERY"`; `count`
    /// is the number reported on the header line (for `LOAN`, the number of
    /// *freshly* granted loans, which can be `0` even when books matched).
    /// `response_data`, when present, is the aggregated book text sent back
    /// to the client, independent of `count`.
    pub fn record(&self, kind: &str, count: usize, response_data: Option<&str>) -> std::io::Result<()> {
        let mut file = self.file.lock().unwrap();
        write!(file, "{} {}\n\n", kind, count)?;
        if let Some(data) = response_data {
            write!(file, "{}\n\n", data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_a_query_with_no_matches() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let log = OperationLog::create(file.path().to_str().unwrap()).unwrap();
        log.record("QUERY", 0, None).unwrap();
        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(contents, "QUERY 0\n\n");
    }

    #[test]
    fn records_a_loan_with_response_data() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let log = OperationLog::create(file.path().to_str().unwrap()).unwrap();
        log.record("LOAN", 1, Some("Titolo: x;\n")).unwrap();
        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(contents, "LOAN 1\n\nTitolo: x;\n\n\n");
    }
}

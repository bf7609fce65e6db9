//! The in-memory book catalogue: load from a flat record file, multi-field
//! index, conjunctive query execution, and atomic persist on shutdown.

use crate::book::{self, Book};
use crate::error::CatalogueError;
use crate::fsutil;
use crate::index::ValueTree;
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub struct Catalogue {
    books: Vec<Book>,
    fields: HashMap<String, ValueTree>,
}

impl Catalogue {
    /// Loads every record from `path`, one book per non-trivial line.
    /// Lines shorter than 3 bytes are skipped, matching the original
    /// program's tolerance for stray blank lines at the end of a record
    /// file.
    pub fn load(path: &Path) -> Result<Self, CatalogueError> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);

        let mut books = Vec::new();
        let mut fields: HashMap<String, ValueTree> = HashMap::new();

        for line in reader.lines() {
            let line = line?;
            if line.len() < 3 {
                continue;
            }
            if !book::has_valid_format(&line) {
                return Err(CatalogueError::BadFormatRecord);
            }

            let new_book = Book::from_record_line(&line).map_err(|err| match err {
                crate::error::BookError::BadDate => CatalogueError::BadDate,
                crate::error::BookError::BadFormatRecord => CatalogueError::BadFormatRecord,
                crate::error::BookError::System(e) => CatalogueError::Io(e),
            })?;

            let book_index = books.len();
            index_book(&mut fields, &new_book, book_index);
            books.push(new_book);
        }

        Ok(Catalogue { books, fields })
    }

    /// Runs a conjunctive query, optionally granting a loan on every match.
    /// Returns the number of matching books, the number of *those* matches
    /// for which a loan was freshly granted this call (always `0` when
    /// `grant_loan` is false), and the matches' concatenated,
    /// newline-terminated descriptions, in the order the index's
    /// right-subtree-continuation search visits them. A book already on
    /// loan still matches and is still listed; it just isn't counted as a
    /// fresh grant.
    pub fn query(&self, request: &str, grant_loan: bool) -> Result<(usize, usize, String), CatalogueError> {
        let canonical_request = book::format_canonical(request);
        if !book::has_valid_format(&canonical_request) {
            return Err(CatalogueError::BadFormatRequest);
        }

        let (field, value, _) =
            book::extract_pair(&canonical_request).ok_or(CatalogueError::BadFormatRequest)?;

        let candidates = match self.fields.get(field) {
            Some(tree) => tree.find_all(value),
            None => return Ok((0, 0, String::new())),
        };

        let mut response = String::new();
        let mut matched = 0usize;
        let mut granted = 0usize;

        for book_index in candidates {
            let candidate = &self.books[book_index];
            if !candidate.matches_request(&canonical_request)? {
                continue;
            }

            if grant_loan && candidate.try_loan()? {
                granted += 1;
            }

            response.push_str(&candidate.read()?);
            matched += 1;
        }

        Ok((matched, granted, response))
    }

    /// Rewrites `record_path` with every book's current text, via a sibling
    /// temp file in `build_dir` plus an atomic rename.
    pub fn persist(&self, record_path: &Path, build_dir: &Path) -> Result<(), CatalogueError> {
        let mut contents = String::new();
        for book in &self.books {
            contents.push_str(&book.read()?);
        }

        let pid = std::process::id();
        let temp_path = build_dir.join(format!("temp_{}.txt", pid));
        fsutil::atomic_write(&temp_path, contents.as_bytes())?;
        std::fs::rename(&temp_path, record_path)?;

        Ok(())
    }
}

/// Indexes every `field:value;` pair of a freshly-built book's description.
fn index_book(fields: &mut HashMap<String, ValueTree>, new_book: &Book, book_index: usize) {
    let description = new_book.description();
    let mut rest = description.as_str();
    while let Some((field, value, remainder)) = book::extract_pair(rest) {
        let field = book::format_canonical(field);
        let value = book::format_canonical(value);
        fields.entry(field).or_insert_with(ValueTree::new).insert(value, book_index);
        rest = remainder;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_record_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn loads_and_queries_by_substring() {
        let file = write_record_file(&[
            "titolo: Il Nome della Rosa; autore: Umberto Eco;",
            "titolo: Se questo è un uomo; autore: Primo Levi;",
        ]);

        let catalogue = Catalogue::load(file.path()).unwrap();
        let (count, granted, response) = catalogue.query("autore: eco;", false).unwrap();
        assert_eq!(count, 1);
        assert_eq!(granted, 0);
        assert!(response.contains("Umberto Eco"));
    }

    #[test]
    fn query_with_unknown_field_returns_no_matches() {
        let file = write_record_file(&["titolo: x; autore: y;"]);
        let catalogue = Catalogue::load(file.path()).unwrap();
        let (count, _, _) = catalogue.query("editore: z;", false).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn granting_a_loan_is_reflected_in_a_later_read() {
        let file = write_record_file(&["titolo: x; autore: y;"]);
        let catalogue = Catalogue::load(file.path()).unwrap();

        let (count, granted, _) = catalogue.query("autore: y;", true).unwrap();
        assert_eq!(count, 1);
        assert_eq!(granted, 1);

        let (count_again, granted_again, response_again) = catalogue.query("autore: y;", true).unwrap();
        assert_eq!(
            count_again, 1,
            "the book is still a conjunctive match while on loan"
        );
        assert_eq!(granted_again, 0, "it was already on loan, so no fresh grant");
        assert!(response_again.contains("titolo"));
    }

    #[test]
    fn malformed_request_is_rejected() {
        let file = write_record_file(&["titolo: x; autore: y;"]);
        let catalogue = Catalogue::load(file.path()).unwrap();
        assert!(catalogue.query("not a request", false).is_err());
    }
}

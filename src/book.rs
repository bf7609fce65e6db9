//! A single book record: display/canonical formatting, the loan state
//! machine, and conjunctive request matching.

use crate::error::BookError;
use crate::time::{self, CivilTime};
use std::sync::Mutex;

fn is_special_char(c: char) -> bool {
    matches!(c, ':' | ',' | '.' | ';' | '!')
}

/// Collapses leading/trailing whitespace and runs of internal whitespace,
/// and drops a space that immediately precedes a special character. Keeps
/// case and the remaining spacing intact — this is the *display* form.
pub fn format_for_display(input: &str) -> String {
    let trimmed = input.trim();
    let chars: Vec<char> = trimmed.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut space_found = false;
    for (i, &c) in chars.iter().enumerate() {
        if c.is_whitespace() {
            if space_found {
                continue;
            }
            if chars.get(i + 1).map_or(false, |&next| is_special_char(next)) {
                continue;
            }
            space_found = true;
        } else {
            space_found = false;
        }
        out.push(c);
    }
    out
}

/// Trims, lowercases and strips *all* whitespace. Used for index keys and
/// values, and for disposable copies of a description/request used only to
/// check matches — never for the stored display text.
pub fn format_canonical(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Pulls the next `field:value;` pair out of `s`, returning the pair and the
/// remainder of the string after the terminating `;`.
pub fn extract_pair(s: &str) -> Option<(&str, &str, &str)> {
    let colon = s.find(':')?;
    let (field, rest) = s.split_at(colon);
    let rest = &rest[1..];
    let semicolon = rest.find(';')?;
    let (value, remainder) = rest.split_at(semicolon);
    Some((field, value, &remainder[1..]))
}

/// Returns true iff `s` contains at least one `field:value;` pair and never
/// a colon that isn't followed by a terminating semicolon. Trailing text
/// after the last complete pair is tolerated as long as it has no dangling
/// colon, matching the original program's scan.
pub fn has_valid_format(s: &str) -> bool {
    let mut rest = s;
    let mut any = false;
    loop {
        match rest.find(':') {
            None => return any,
            Some(colon) => match rest[colon..].find(';') {
                None => return false,
                Some(semicolon_rel) => {
                    any = true;
                    rest = &rest[colon + semicolon_rel + 1..];
                }
            },
        }
    }
}

#[derive(Debug, Clone)]
struct BookRecord {
    /// Display-canonical description, e.g. `titolo: il nome della rosa;
    /// autore: umberto eco;` with original case and minimal spacing, never
    /// containing a `loan:` field (that is tracked separately below).
    description: String,
    on_loan: bool,
    loan_start: Option<CivilTime>,
}

/// A single catalogue entry. Interior mutability covers exactly the loan
/// state; `description` never changes after construction.
pub struct Book {
    state: Mutex<BookRecord>,
}

impl Book {
    /// Builds a book from one raw line of a record file (already known to
    /// satisfy [`has_valid_format`]). Strips any trailing newline, applies
    /// display formatting, and pulls a leading `loan:` field (if any)
    /// out into loan state.
    pub fn from_record_line(line: &str) -> Result<Self, BookError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let mut description = format_for_display(line);

        let (on_loan, loan_start) = match extract_loan_field(&description) {
            Some((value, without_field)) => {
                description = without_field;
                let canonical_value = format_canonical(&value);
                let civil = time::parse_loan_date(&canonical_value)?;
                (true, Some(civil))
            }
            None => (false, None),
        };

        Ok(Book {
            state: Mutex::new(BookRecord {
                description,
                on_loan,
                loan_start,
            }),
        })
    }

    /// Checks whether an active loan has passed the fixed expiry window,
    /// clearing it in place if so. Read-triggered only — there is no
    /// background sweep.
    fn check_loan_expiry(record: &mut BookRecord) -> std::io::Result<()> {
        if !record.on_loan {
            return Ok(());
        }
        let now = time::current_time()?;
        let started = record.loan_start.expect("on_loan implies loan_start");
        let elapsed = time::seconds_between(started, now)?;
        if elapsed > crate::paths::LOAN_WINDOW_SECS {
            record.on_loan = false;
            record.loan_start = None;
        }
        Ok(())
    }

    /// Produces the client-facing string for this book: the description
    /// plus, if still on loan after an expiry check, a trailing
    /// `loan: dd-mm-yyyy HH:MM:SS;` field, always newline-terminated.
    pub fn read(&self) -> std::io::Result<String> {
        let mut record = self.state.lock().unwrap();
        Self::check_loan_expiry(&mut record)?;

        let mut out = record.description.clone();
        if record.on_loan {
            let started = record.loan_start.expect("on_loan implies loan_start");
            out.push_str(" loan: ");
            out.push_str(&time::format_loan_date(started));
            out.push(';');
        }
        out.push('\n');
        Ok(out)
    }

    /// Attempts to grant a loan. Returns `Ok(true)` if the book was free and
    /// is now on loan as of now, `Ok(false)` if it was already on loan.
    pub fn try_loan(&self) -> std::io::Result<bool> {
        let mut record = self.state.lock().unwrap();
        Self::check_loan_expiry(&mut record)?;

        if record.on_loan {
            return Ok(false);
        }
        record.on_loan = true;
        record.loan_start = Some(time::current_time()?);
        Ok(true)
    }

    /// The display-canonical description, with no loan suffix. Used only to
    /// build the field/value index at load time.
    pub fn description(&self) -> String {
        self.state.lock().unwrap().description.clone()
    }

    /// Checks whether every `field:value;` pair in `request` has a matching
    /// occurrence in this book's canonicalized description.
    pub fn matches_request(&self, request: &str) -> std::io::Result<bool> {
        let described = self.read()?;
        let canonical_description = format_canonical(&described);

        let mut rest = request;
        while let Some((field, value, remainder)) = extract_pair(rest) {
            let field = format_canonical(field);
            let value = format_canonical(value);

            if !field_value_occurs(&canonical_description, &field, &value) {
                return Ok(false);
            }
            rest = remainder;
        }
        Ok(true)
    }
}

/// Finds a `field` occurrence in `haystack` such that `value` occurs before
/// the next `;`, scanning forward one `field` occurrence at a time.
fn field_value_occurs(haystack: &str, field: &str, value: &str) -> bool {
    let mut search_from = 0;
    while let Some(rel) = haystack[search_from..].find(field) {
        let field_pos = search_from + rel;
        let tail = &haystack[field_pos..];
        let semicolon = tail.find(';').unwrap_or(tail.len());
        if let Some(value_pos) = tail.find(value) {
            if value_pos < semicolon {
                return true;
            }
        }
        search_from = field_pos + 1;
        if search_from >= haystack.len() {
            break;
        }
    }
    false
}

/// Pulls a `loan:value;` field out of a display-formatted description,
/// returning the field's value and the description with the field removed.
fn extract_loan_field(description: &str) -> Option<(String, String)> {
    let start = description.find("loan:")?;
    let tail = &description[start..];
    let semicolon_rel = tail.find(';')?;
    let value = tail["loan:".len()..semicolon_rel].to_string();

    let mut without_field = String::with_capacity(description.len());
    without_field.push_str(&description[..start]);
    without_field.push_str(&description[start + semicolon_rel + 1..]);
    Some((value, without_field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formatting_collapses_whitespace_and_keeps_case() {
        let out = format_for_display("  Titolo :  Il Nome della Rosa ;  Autore: Umberto Eco ; \n");
        assert_eq!(out, "Titolo: Il Nome della Rosa; Autore: Umberto Eco;");
    }

    #[test]
    fn canonical_formatting_strips_all_whitespace_and_lowercases() {
        assert_eq!(format_canonical(" Umberto  Eco "), "umbertoeco");
    }

    #[test]
    fn valid_format_requires_complete_pairs() {
        assert!(has_valid_format("titolo: x; autore: y;"));
        assert!(!has_valid_format("titolo: x; autore"));
        assert!(!has_valid_format("no pairs here"));
    }

    #[test]
    fn builds_book_without_loan_field() {
        let book = Book::from_record_line("titolo: Il Nome della Rosa; autore: Umberto Eco;\n").unwrap();
        let text = book.read().unwrap();
        assert_eq!(text, "Titolo: Il Nome della Rosa; Autore: Umberto Eco;\n");
    }

    #[test]
    fn try_loan_is_idempotent_until_released() {
        let book = Book::from_record_line("titolo: x; autore: y;\n").unwrap();
        assert!(book.try_loan().unwrap());
        assert!(!book.try_loan().unwrap());
    }

    #[test]
    fn matches_request_is_conjunctive() {
        let book = Book::from_record_line("titolo: Il Nome della Rosa; autore: Umberto Eco;\n").unwrap();
        assert!(book.matches_request("autore: eco;").unwrap());
        assert!(book.matches_request("autore: eco; titolo: rosa;").unwrap());
        assert!(!book.matches_request("autore: eco; titolo: orecchio;").unwrap());
    }
}

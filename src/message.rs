//! The header-plus-body message format shared by commits and tags, and the
//! identity line format used by `author`/`committer`/`tagger`.
//!
//! Parsing is an iterative cursor walk that splits on the next space vs.
//! the next newline to tell a header line from the blank-line/text
//! boundary, folding and unfolding continuation lines via `"\n "`.

use crate::error::{Error, Result};

/// A parsed `author`/`committer`/`tagger` value.
///
/// The timestamp and timezone are kept as their raw textual form rather
/// than decoded into a numeric offset, so that re-emitting an `Identity`
/// parsed from existing bytes always reproduces those bytes exactly.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    /// The identity's display name. May contain spaces.
    pub name: String,
    /// The identity's email address, without angle brackets.
    pub email: String,
    /// Unix seconds, as they appeared in the source line.
    pub seconds: i64,
    /// The signed four-digit timezone offset, e.g. `-0700`.
    pub tz_offset: String,
}

/// Parses an identity line: `<name> <email> <seconds> <tz>`.
pub fn parse_identity(line: &[u8]) -> Result<Identity> {
    let malformed = || Error::MalformedIdentity(String::from_utf8_lossy(line).into_owned());

    let email_start = line.iter().position(|&b| b == b'<').ok_or_else(malformed)?;
    let email_end = line[email_start..]
        .iter()
        .position(|&b| b == b'>')
        .map(|offset| email_start + offset)
        .ok_or_else(malformed)?;

    // Expect " <" immediately before the email and "> " immediately after.
    if email_start == 0 || line[email_start - 1] != b' ' {
        return Err(malformed());
    }
    let name = std::str::from_utf8(&line[..email_start - 1]).map_err(|_| malformed())?;
    let email = std::str::from_utf8(&line[email_start + 1..email_end]).map_err(|_| malformed())?;

    let rest = &line[email_end + 1..];
    let rest = rest.strip_prefix(b" ").ok_or_else(malformed)?;
    let sp = rest.iter().position(|&b| b == b' ').ok_or_else(malformed)?;
    let seconds_str = std::str::from_utf8(&rest[..sp]).map_err(|_| malformed())?;
    let seconds: i64 = seconds_str.parse().map_err(|_| malformed())?;
    let tz_offset = std::str::from_utf8(&rest[sp + 1..]).map_err(|_| malformed())?;

    Ok(Identity {
        name: name.to_string(),
        email: email.to_string(),
        seconds,
        tz_offset: tz_offset.to_string(),
    })
}

/// Emits an identity back to its wire form.
pub fn emit_identity(identity: &Identity) -> Vec<u8> {
    format!(
        "{} <{}> {} {}",
        identity.name, identity.email, identity.seconds, identity.tz_offset
    )
    .into_bytes()
}

/// A header-plus-text message, as shared by commits and tags.
///
/// Headers are kept as an ordered list of `(key, value)` pairs rather than
/// a map, so that a duplicate key (as with multiple `parent` lines) and the
/// exact interleaving order of distinct keys both round-trip exactly.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct Message {
    headers: Vec<(String, Vec<u8>)>,
    text: Vec<u8>,
}

impl Message {
    /// Builds an empty message with the given text payload.
    pub fn new(text: impl Into<Vec<u8>>) -> Message {
        Message {
            headers: Vec::new(),
            text: text.into(),
        }
    }

    /// Appends a header, preserving any existing headers under the same key.
    pub fn push_header(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.headers.push((key.into(), value.into()));
    }

    /// Returns the first value stored under `key`, if any.
    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Returns every value stored under `key`, in order of appearance.
    pub fn headers<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a [u8]> {
        self.headers
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// The free-form text payload following the blank-line separator.
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Sets the text payload.
    pub fn set_text(&mut self, text: impl Into<Vec<u8>>) {
        self.text = text.into();
    }
}

/// Parses a message body: headers up to the blank line, then free text.
///
/// Implements an iterative cursor walk: repeatedly locate the
/// next space and the next newline from the cursor. A newline before a
/// space (or no space at all) marks the blank line; everything after it is
/// the text payload. Otherwise the bytes up to the space are a key, and the
/// value runs to the first newline *not* immediately followed by a space
/// (folded continuation lines), with interior `"\n "` unfolded to `"\n"`.
pub fn parse(data: &[u8]) -> Result<Message> {
    let mut message = Message::default();
    let mut cursor = 0usize;

    loop {
        let space = find_from(data, cursor, b' ');
        let newline = find_from(data, cursor, b'\n');

        let blank_line = match (space, newline) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(s), Some(n)) => n < s,
        };

        if blank_line {
            let text_start = match newline {
                Some(n) => n + 1,
                None => cursor,
            };
            message.set_text(data[text_start.min(data.len())..].to_vec());
            return Ok(message);
        }

        let space = space.expect("blank_line is false, so a space was found");
        let key = std::str::from_utf8(&data[cursor..space])
            .map_err(|_| Error::MalformedCannotParse("<message header key>".to_string()))?
            .to_string();

        // Value runs until a newline that is not immediately followed by a
        // space (i.e. not a folded continuation).
        let mut end = find_from(data, space + 1, b'\n')
            .ok_or_else(|| Error::MalformedCannotParse(key.clone()))?;
        while data.get(end + 1) == Some(&b' ') {
            end = find_from(data, end + 1, b'\n')
                .ok_or_else(|| Error::MalformedCannotParse(key.clone()))?;
        }

        let raw_value = &data[space + 1..end];
        let value = unfold(raw_value);
        message.push_header(key, value);

        cursor = end + 1;
    }
}

/// Emits a message: each header on its own (possibly folded) line, then a
/// blank line, then the text payload verbatim.
pub fn emit(message: &Message) -> Vec<u8> {
    let mut out = Vec::new();
    for (key, value) in &message.headers {
        out.extend_from_slice(key.as_bytes());
        out.push(b' ');
        out.extend_from_slice(&fold(value));
        out.push(b'\n');
    }
    out.push(b'\n');
    out.extend_from_slice(&message.text);
    out
}

/// Replaces every `"\n "` in `value` with `"\n"` (continuation unfolding).
fn unfold(value: &[u8]) -> Vec<u8> {
    replace_sequence(value, b"\n ", b"\n")
}

/// Replaces every `"\n"` in `value` with `"\n "` (continuation folding).
fn fold(value: &[u8]) -> Vec<u8> {
    replace_sequence(value, b"\n", b"\n ")
}

fn replace_sequence(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

fn find_from(data: &[u8], start: usize, byte: u8) -> Option<usize> {
    if start > data.len() {
        return None;
    }
    data[start..].iter().position(|&b| b == byte).map(|p| p + start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commit_shape() {
        let data = b"tree 29ff16c9c14e2652b22f8b78bb08a5a07930c147\n\
parent 206941306e8a8af65b66eaaaea388a7ae24d49a0\n\
author Carlton Duffett <carlton.duffett@gmail.com> 1527025023 -0700\n\
committer Carlton Duffett <carlton.duffett@gmail.com> 1527025044 -0700\n\
\n\
Add attribute to model.\n";
        let msg = parse(data).unwrap();
        assert_eq!(
            msg.header("tree"),
            Some(&b"29ff16c9c14e2652b22f8b78bb08a5a07930c147"[..])
        );
        assert_eq!(msg.text(), b"Add attribute to model.\n");
        assert_eq!(emit(&msg), data);
    }

    #[test]
    fn folds_and_unfolds_multiline_gpgsig() {
        let data = b"tree abc\n\
gpgsig -----BEGIN PGP SIGNATURE-----\n\
 line one\n\
 line two\n\
 -----END PGP SIGNATURE-----\n\
\n\
Initial commit\n";
        let msg = parse(data).unwrap();
        let sig = msg.header("gpgsig").unwrap();
        assert_eq!(
            sig,
            b"-----BEGIN PGP SIGNATURE-----\nline one\nline two\n-----END PGP SIGNATURE-----"
        );
        assert_eq!(emit(&msg), data);
    }

    #[test]
    fn preserves_duplicate_keys_in_order() {
        let data = b"parent aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\n\
parent bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\n\
\n\
Merge\n";
        let msg = parse(data).unwrap();
        let parents: Vec<_> = msg.headers("parent").collect();
        assert_eq!(parents.len(), 2);
        assert_eq!(emit(&msg), data);
    }

    #[test]
    fn value_containing_literal_newline_space_round_trips() {
        // A header value that happens to already contain "\n " verbatim in its
        // decoded form should still round-trip through fold/unfold.
        let mut msg = Message::new("text\n");
        msg.push_header("tree", "abc");
        msg.push_header("weird", "line1\nline2");
        let emitted = emit(&msg);
        let reparsed = parse(&emitted).unwrap();
        assert_eq!(reparsed.header("weird"), Some(&b"line1\nline2"[..]));
        assert_eq!(emit(&reparsed), emitted);
    }

    #[test]
    fn parses_and_emits_identity() {
        let line = b"Carlton Duffett <carlton.duffett@gmail.com> 1527025023 -0700";
        let identity = parse_identity(line).unwrap();
        assert_eq!(identity.name, "Carlton Duffett");
        assert_eq!(identity.email, "carlton.duffett@gmail.com");
        assert_eq!(identity.seconds, 1527025023);
        assert_eq!(identity.tz_offset, "-0700");
        assert_eq!(emit_identity(&identity), line);
    }

    #[test]
    fn identity_name_and_email_may_contain_spaces() {
        let line = b"Two Names <person with spaces@example.com> 1 +0000";
        let identity = parse_identity(line).unwrap();
        assert_eq!(identity.name, "Two Names");
        assert_eq!(identity.email, "person with spaces@example.com");
        assert_eq!(emit_identity(&identity), line);
    }

    #[test]
    fn malformed_identity_is_rejected() {
        assert!(parse_identity(b"no angle brackets here").is_err());
        assert!(parse_identity(b"Name <unterminated").is_err());
    }

    #[test]
    fn empty_body_is_just_a_blank_line_and_empty_text() {
        let msg = parse(b"\n").unwrap();
        assert!(msg.header("anything").is_none());
        assert_eq!(msg.text(), b"");
    }
}

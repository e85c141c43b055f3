//! Line-oriented segmentation text format
//!
//! One segment per line:
//!
//! ```text
//! label [start [end [score]]] [# comment]
//! ```
//!
//! `label` may hold several names joined by `+`. Fields are separated by
//! blanks. Empty lines and comment lines are allowed. Reading is permissive
//! about the numeric fields: scanning stops at the first token that does not
//! start with a number and whatever was read so far is kept.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use super::{Segment, Segmentation};
use crate::error::{SadError, SadResult};

/// Starts a comment extending to the end of the line.
pub const COMMENT_CHAR: char = '#';

/// Path standing for stdin/stdout.
const STDIO_PATH: &str = "-";

/// Fields recovered from one line of a segmentation file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedLine<'a> {
    pub name: &'a str,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub score: Option<f64>,
}

/// Parse one line. Returns `None` for blank and comment-only lines.
pub fn parse_line(line: &str) -> Option<ParsedLine<'_>> {
    let content = match line.find(COMMENT_CHAR) {
        Some(pos) => &line[..pos],
        None => line,
    };
    let content = content.trim_start();
    if content.is_empty() {
        return None;
    }

    let (name, mut rest) = match content.find(char::is_whitespace) {
        Some(pos) => (&content[..pos], &content[pos..]),
        None => (content, ""),
    };

    let mut values = [None; 3];
    for slot in values.iter_mut() {
        match scan_float(rest) {
            Some((value, remainder)) => {
                *slot = Some(value);
                rest = remainder;
            }
            None => break,
        }
    }

    Some(ParsedLine {
        name,
        start: values[0],
        end: values[1],
        score: values[2],
    })
}

/// Read the longest leading floating-point number of `text` (after blanks),
/// the way `strtod` does. Returns the value and the unread remainder.
fn scan_float(text: &str) -> Option<(f64, &str)> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        digits += i - frac_start;
    }

    if digits == 0 {
        return None;
    }

    // exponent only counts if digits follow
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }

    let value = text[..i].parse::<f64>().ok()?;
    Some((value, &text[i..]))
}

/// Read a segmentation from any buffered source.
///
/// Fails on IO errors and on a line whose label holds no name; nothing of a
/// partially read list is returned in that case.
pub fn read<R: BufRead>(reader: R) -> SadResult<Segmentation> {
    let mut segmentation = Segmentation::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let Some(parsed) = parse_line(&line) else {
            continue;
        };

        let segment = Segment::new(Some(parsed.name), parsed.start, parsed.end, parsed.score)
            .map_err(|_| SadError::MalformedLabel {
                line: index + 1,
                text: parsed.name.to_string(),
            })?;
        segmentation.push(segment);
    }

    Ok(segmentation)
}

/// Read a segmentation file; `-` reads stdin.
pub fn read_file(path: &Path) -> SadResult<Segmentation> {
    let segmentation = if path.as_os_str() == STDIO_PATH {
        read(io::stdin().lock())?
    } else {
        let file = File::open(path).map_err(|e| SadError::open(path, e))?;
        read(BufReader::new(file))?
    };

    debug!(
        "read {} segments from {}",
        segmentation.len(),
        path.display()
    );
    Ok(segmentation)
}

/// Which fields the writer emits.
///
/// Parsed from a selector string holding any of `l` (label), `s` (start),
/// `e` (end) and `p` (score), case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSelector {
    pub label: bool,
    pub start: bool,
    pub end: bool,
    pub score: bool,
}

impl FieldSelector {
    pub const ALL: FieldSelector = FieldSelector {
        label: true,
        start: true,
        end: true,
        score: true,
    };

    /// `None` selects every field.
    pub fn parse(selector: Option<&str>) -> Self {
        match selector {
            None => Self::ALL,
            Some(s) => {
                let has = |c: char| s.chars().any(|x| x.eq_ignore_ascii_case(&c));
                Self {
                    label: has('l'),
                    start: has('s'),
                    end: has('e'),
                    score: has('p'),
                }
            }
        }
    }
}

impl Default for FieldSelector {
    fn default() -> Self {
        Self::ALL
    }
}

impl FromStr for FieldSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(Some(s)))
    }
}

/// Format a score like C's `%e`: six fractional digits and a signed,
/// two-digit-minimum exponent (`1.250000e-01`).
pub fn format_score(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string().to_lowercase();
    }

    let formatted = format!("{:.6e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => formatted,
    }
}

/// Write one line per segment. Unset times and scores are omitted.
/// Returns the number of segments written.
pub fn write<W: Write>(
    segmentation: &Segmentation,
    out: &mut W,
    fields: FieldSelector,
) -> SadResult<usize> {
    let mut written = 0;

    for segment in segmentation {
        if fields.label {
            if let Some(label) = segment.label() {
                write!(out, "{}", label)?;
            }
        }
        if let (true, Some(start)) = (fields.start, segment.start()) {
            write!(out, " {:.5}", start)?;
        }
        if let (true, Some(end)) = (fields.end, segment.end()) {
            write!(out, " {:.5}", end)?;
        }
        if let (true, Some(score)) = (fields.score, segment.score()) {
            write!(out, " {}", format_score(score))?;
        }
        writeln!(out)?;
        written += 1;
    }

    Ok(written)
}

/// Write a segmentation file; `-` writes to stdout.
pub fn write_file(
    segmentation: &Segmentation,
    path: &Path,
    fields: FieldSelector,
) -> SadResult<usize> {
    let written = if path.as_os_str() == STDIO_PATH {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let n = write(segmentation, &mut out, fields)?;
        out.flush()?;
        n
    } else {
        let file = File::create(path).map_err(|e| SadError::open(path, e))?;
        let mut out = BufWriter::new(file);
        let n = write(segmentation, &mut out, fields)?;
        out.flush()?;
        n
    };

    debug!("wrote {} segments to {}", written, path.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Label;

    #[test]
    fn test_parse_line_with_trailing_comment() {
        let parsed = parse_line("speech+loud   1.0   2.5   # trailing note").unwrap();
        assert_eq!(parsed.name, "speech+loud");
        assert_eq!(parsed.start, Some(1.0));
        assert_eq!(parsed.end, Some(2.5));
        assert_eq!(parsed.score, None);

        let label = Label::parse(parsed.name).unwrap();
        assert_eq!(label, Label::parse("loud+speech").unwrap());
    }

    #[test]
    fn test_parse_line_skips_blank_and_comment_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   \t  ").is_none());
        assert!(parse_line("# just a note").is_none());
        assert!(parse_line("    # indented note").is_none());
    }

    #[test]
    fn test_parse_line_label_only() {
        let parsed = parse_line("\tmusic").unwrap();
        assert_eq!(parsed.name, "music");
        assert_eq!(parsed.start, None);
        assert_eq!(parsed.end, None);
    }

    #[test]
    fn test_parse_line_all_fields() {
        let parsed = parse_line("sil 0.5 1.25 -3.5e-2").unwrap();
        assert_eq!(parsed.start, Some(0.5));
        assert_eq!(parsed.end, Some(1.25));
        assert_eq!(parsed.score, Some(-0.035));
    }

    #[test]
    fn test_parse_line_is_permissive_with_numbers() {
        // scan stops at the first non-number
        let parsed = parse_line("sil 1.5 abc 3.0").unwrap();
        assert_eq!(parsed.start, Some(1.5));
        assert_eq!(parsed.end, None);
        assert_eq!(parsed.score, None);

        // residual characters end the scan after the number they follow
        let parsed = parse_line("sil 1.5x 2.0").unwrap();
        assert_eq!(parsed.start, Some(1.5));
        assert_eq!(parsed.end, None);

        // adjacent signed numbers are still split
        let parsed = parse_line("sil 1.5-2.0").unwrap();
        assert_eq!(parsed.start, Some(1.5));
        assert_eq!(parsed.end, Some(-2.0));

        // dangling exponent marker is not part of the number
        let parsed = parse_line("sil 2e").unwrap();
        assert_eq!(parsed.start, Some(2.0));
    }

    #[test]
    fn test_parse_line_ignores_extra_numbers() {
        let parsed = parse_line("x 1 2 3 4 5").unwrap();
        assert_eq!(parsed.score, Some(3.0));
    }

    #[test]
    fn test_read_skips_comments_and_keeps_order() {
        let text = "# header\nsil 0.0 0.4\n\nspeech 0.4 1.0 # end\n";
        let list = read(text.as_bytes()).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.get(0).unwrap().has_name("sil"));
        assert_eq!(list.get(1).unwrap().end(), Some(1.0));
    }

    #[test]
    fn test_read_rejects_nameless_label() {
        let text = "sil 0.0 0.4\n+ 0.4 1.0\n";
        match read(text.as_bytes()) {
            Err(SadError::MalformedLabel { line, text }) => {
                assert_eq!(line, 2);
                assert_eq!(text, "+");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_write_all_fields() {
        let mut list = Segmentation::new();
        list.push(Segment::new(Some("speech+loud"), Some(1.0), Some(2.5), Some(0.125)).unwrap());
        list.push(Segment::new(Some("sil"), Some(2.5), None, None).unwrap());

        let mut out = Vec::new();
        let n = write(&list, &mut out, FieldSelector::ALL).unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "speech+loud 1.00000 2.50000 1.250000e-01\nsil 2.50000\n"
        );
    }

    #[test]
    fn test_write_field_selector() {
        let mut list = Segmentation::new();
        list.push(Segment::new(Some("speech"), Some(1.0), Some(2.0), Some(3.0)).unwrap());

        let mut out = Vec::new();
        write(&list, &mut out, FieldSelector::parse(Some("LE"))).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "speech 2.00000\n");

        let mut out = Vec::new();
        write(&list, &mut out, FieldSelector::parse(Some("sp"))).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), " 1.00000 3.000000e+00\n");
    }

    #[test]
    fn test_round_trip() {
        let mut list = Segmentation::new();
        list.push(Segment::new(Some("b+a"), Some(0.123456), Some(1.5), Some(-2.0e-3)).unwrap());
        list.push(Segment::new(Some("sil"), Some(1.5), Some(3.333333), Some(42.0)).unwrap());

        let mut out = Vec::new();
        write(&list, &mut out, FieldSelector::ALL).unwrap();
        let back = read(out.as_slice()).unwrap();

        assert_eq!(back.len(), list.len());
        for (a, b) in list.iter().zip(back.iter()) {
            assert_eq!(a.label(), b.label());
            assert!((a.start().unwrap() - b.start().unwrap()).abs() < 1e-5);
            assert!((a.end().unwrap() - b.end().unwrap()).abs() < 1e-5);
            let (sa, sb) = (a.score().unwrap(), b.score().unwrap());
            assert!((sa - sb).abs() <= sa.abs() * 1e-6);
        }
    }

    #[test]
    fn test_format_score_matches_c_style() {
        assert_eq!(format_score(0.0), "0.000000e+00");
        assert_eq!(format_score(123456.0), "1.234560e+05");
        assert_eq!(format_score(-0.00025), "-2.500000e-04");
        assert_eq!(format_score(1e-120), "1.000000e-120");
    }

    #[test]
    fn test_read_file_missing_path() {
        let err = read_file(Path::new("/nonexistent/dir/file.seg")).unwrap_err();
        assert!(matches!(err, SadError::Open { .. }));
    }
}

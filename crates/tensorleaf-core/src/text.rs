// Text matrices: numeric data from files and literal strings
//
// A text matrix file has one matrix row per line, values separated by
// whitespace. Blank lines and lines starting with '#' are skipped:
//
//   # 2 x 3
//   0.1  0.2  0.3
//   0.4  0.5  0.6
//
// A literal array string is the same thing inline, with ';' (or a newline)
// between rows and whitespace or ',' between values:
//
//   "1 2 3; 4 5 6"      or      "1,2,3;4,5,6"
//
// Both parse into a column-major buffer plus its row and column counts,
// ready to be handed to `Matrix::from_col_major`. Every row must have the
// same number of values.

use std::fs;
use std::path::Path;

use crate::dtype::Element;
use crate::error::{Error, Result};

/// A parsed text matrix: column-major values plus geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMatrix<E: Element> {
    pub rows: usize,
    pub cols: usize,
    /// Column-major values: element (r, c) at `c * rows + r`.
    pub data: Vec<E>,
}

/// Load a whitespace-delimited numeric matrix from a text file.
pub fn load_matrix_from_text_file<E: Element>(path: impl AsRef<Path>) -> Result<ParsedMatrix<E>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::runtime(format!("failed to read matrix file {}: {e}", path.display()))
    })?;
    let lines = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().starts_with('#'));
    parse_rows(&path.display().to_string(), lines, |c: char| c.is_whitespace())
}

/// Parse a literal array string such as `"1 2 3; 4 5 6"`.
pub fn load_matrix_from_string_literal<E: Element>(literal: &str) -> Result<ParsedMatrix<E>> {
    let rows = literal
        .split(|c: char| c == ';' || c == '\n')
        .enumerate()
        .map(|(i, l)| (i + 1, l));
    parse_rows("literal", rows, |c: char| c.is_whitespace() || c == ',')
}

fn parse_rows<'a, E: Element>(
    source_name: &str,
    lines: impl Iterator<Item = (usize, &'a str)>,
    is_separator: impl Fn(char) -> bool + Copy,
) -> Result<ParsedMatrix<E>> {
    // Row-major while reading, transposed to column-major at the end.
    let mut row_major: Vec<E> = Vec::new();
    let mut rows = 0usize;
    let mut cols = 0usize;

    for (line_no, line) in lines {
        let mut count = 0usize;
        for token in line.split(is_separator).filter(|t| !t.is_empty()) {
            let v: f64 = token.parse().map_err(|e| Error::Parse {
                source_name: source_name.to_string(),
                line: line_no,
                message: format!("cannot parse '{token}' as a number: {e}"),
            })?;
            row_major.push(E::from_f64(v));
            count += 1;
        }
        if count == 0 {
            continue;
        }
        if rows == 0 {
            cols = count;
        } else if count != cols {
            return Err(Error::Parse {
                source_name: source_name.to_string(),
                line: line_no,
                message: format!("row has {count} values, expected {cols}"),
            });
        }
        rows += 1;
    }

    if rows == 0 {
        return Err(Error::runtime(format!("{source_name}: no numeric data found")));
    }

    let mut data = vec![E::zero(); rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            data[c * rows + r] = row_major[r * cols + c];
        }
    }
    Ok(ParsedMatrix { rows, cols, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_literal_rows_and_cols() {
        let m: ParsedMatrix<f64> = load_matrix_from_string_literal("1 2 3; 4 5 6").unwrap();
        assert_eq!((m.rows, m.cols), (2, 3));
        assert_eq!(m.data, vec![1., 4., 2., 5., 3., 6.]);
    }

    #[test]
    fn test_literal_commas() {
        let m: ParsedMatrix<f32> = load_matrix_from_string_literal("1,2;3,4;").unwrap();
        assert_eq!((m.rows, m.cols), (2, 2));
        assert_eq!(m.data, vec![1., 3., 2., 4.]);
    }

    #[test]
    fn test_ragged_rows() {
        let err = load_matrix_from_string_literal::<f32>("1 2; 3").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn test_bad_number() {
        let err = load_matrix_from_string_literal::<f32>("1 x").unwrap_err();
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_file_with_comments() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "# header").unwrap();
        writeln!(f, "0.5 1.5").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "2.5 3.5").unwrap();
        let m: ParsedMatrix<f64> = load_matrix_from_text_file(f.path()).unwrap();
        assert_eq!((m.rows, m.cols), (2, 2));
        assert_eq!(m.data, vec![0.5, 2.5, 1.5, 3.5]);
    }

    #[test]
    fn test_missing_file() {
        let err = load_matrix_from_text_file::<f32>("/nonexistent/weights.txt").unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
    }

    #[test]
    fn test_empty_literal() {
        assert!(load_matrix_from_string_literal::<f32>("  ").is_err());
    }
}

// CSV columns: load feature and target columns by header name
//
// A small delimiter-separated reader that needs no external CSV crate. The
// first non-blank line is the header row; every later non-blank line is a
// data row with exactly as many fields as the header. The caller names the
// feature columns (in the order the model should see them) and the target
// column. Every selected cell must parse as f64; unselected columns may hold
// anything.
//
// Fields may be wrapped in double quotes, in which case they can contain the
// delimiter and `""` stands for a literal quote. Records never span lines.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use regrad_core::{Error, Result};

/// Which columns to extract from a delimited file.
///
/// # Example
/// ```ignore
/// let spec = ColumnSpec::new("Pass").feature("Hours");
/// let cols = read_columns("data/study.csv", &spec)?;
/// ```
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Feature headers, in model order.
    pub features: Vec<String>,
    /// Target header.
    pub target: String,
    /// Field delimiter (default: `,`).
    pub delimiter: char,
}

impl ColumnSpec {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            features: Vec::new(),
            target: target.into(),
            delimiter: ',',
        }
    }

    /// Append one feature column.
    pub fn feature(mut self, header: impl Into<String>) -> Self {
        self.features.push(header.into());
        self
    }

    pub fn features<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features.extend(headers.into_iter().map(Into::into));
        self
    }

    pub fn delimiter(mut self, d: char) -> Self {
        self.delimiter = d;
        self
    }
}

/// Columns extracted from a file: one vector per feature plus the target.
///
/// Every column has the same length (the number of data rows).
#[derive(Debug, Clone, PartialEq)]
pub struct Columns {
    /// Feature columns, in the order given by [`ColumnSpec::features`].
    pub features: Vec<Arc<[f64]>>,
    pub target: Arc<[f64]>,
    /// The headers that were selected, features first then the target.
    pub headers: Vec<String>,
}

impl Columns {
    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// Feature columns as slices, in the form the fitting functions take.
    pub fn feature_slices(&self) -> Vec<&[f64]> {
        self.features.iter().map(|c| &c[..]).collect()
    }
}

/// Read a delimited file from disk and extract the columns named by `spec`.
pub fn read_columns<P: AsRef<Path>>(path: P, spec: &ColumnSpec) -> Result<Columns> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let columns = parse_columns(&content, spec)?;
    log::debug!(
        "read {} rows x {} features from {}",
        columns.len(),
        columns.features.len(),
        path.display()
    );
    Ok(columns)
}

/// Parse delimited text held in memory.
pub fn parse_columns(content: &str, spec: &ColumnSpec) -> Result<Columns> {
    let delim = spec.delimiter;
    // Keep 1-based line numbers for error messages.
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty());

    let (_, header_line) = lines
        .next()
        .ok_or_else(|| Error::Data("empty input, no header row".to_string()))?;
    let header = split_record(header_line, delim);
    let num_cols = header.len();

    let find = |name: &str| -> Result<usize> {
        header
            .iter()
            .position(|h| h.as_str() == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    };

    let feature_idx = spec
        .features
        .iter()
        .map(|f| find(f.as_str()))
        .collect::<Result<Vec<_>>>()?;
    let target_idx = find(&spec.target)?;

    let mut features: Vec<Vec<f64>> = vec![Vec::new(); feature_idx.len()];
    let mut target = Vec::new();

    for (line_no, line) in lines {
        let cells = split_record(line, delim);
        if cells.len() != num_cols {
            return Err(Error::Data(format!(
                "line {line_no} has {} fields, expected {num_cols}",
                cells.len()
            )));
        }

        let parse = |col: usize| -> Result<f64> {
            let cell = cells[col].as_str();
            cell.parse::<f64>().map_err(|_| Error::ParseFloat {
                line: line_no,
                column: header[col].clone(),
                value: cell.to_string(),
            })
        };

        for (column, &c) in features.iter_mut().zip(&feature_idx) {
            column.push(parse(c)?);
        }
        target.push(parse(target_idx)?);
    }

    if target.is_empty() {
        return Err(Error::Data("header row but no data rows".to_string()));
    }

    let mut headers = spec.features.clone();
    headers.push(spec.target.clone());

    Ok(Columns {
        features: features.into_iter().map(Arc::from).collect(),
        target: target.into(),
        headers,
    })
}

// Split one line into trimmed fields, honouring double quotes.
fn split_record(line: &str, delim: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            c if c == delim && !quoted => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            c => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

//! File formats for expression data.
//!
//! Delimited text and Arrow IPC go through Polars, Excel workbooks through
//! calamine. 10X Matrix Market directories are parsed here and converted
//! to an [`ExpressionMatrix`]; `.h5ad` files are read by
//! [`super::h5ad`] when the `h5ad` feature is on.

use std::fmt;
use std::fs::File;
use std::io::{
    BufRead,
    BufWriter,
};
use std::path::{
    Path,
    PathBuf,
};

use anyhow::{
    anyhow,
    bail,
    ensure,
    Context,
};
use calamine::{
    open_workbook_auto,
    Data,
    Reader,
};
use itertools::Itertools;
use log::{
    debug,
    warn,
};
use ndarray::Array2;
use polars::prelude::{
    Column,
    CsvReadOptions,
    CsvWriter,
    DataFrame,
    IpcReader,
    IpcWriter,
    NamedFrom,
    SerReader,
    SerWriter,
    Series,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::matrix::{
    make_unique,
    ExpressionMatrix,
};
use crate::utils::open_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Tsv,
    H5,
    H5ad,
    Mtx,
    Excel,
    Ipc,
}

const COMPOUND_SUFFIXES: [(&str, FileType); 4] = [
    (".csv.gz", FileType::Csv),
    (".tsv.gz", FileType::Tsv),
    (".txt.gz", FileType::Tsv),
    (".mtx.gz", FileType::Mtx),
];

impl FileType {
    /// Detects the type from the file name. Compound suffixes such as
    /// `.csv.gz` are tried before the last extension.
    pub fn detect<P: AsRef<Path>>(path: P) -> Option<Self> {
        let name = path.as_ref().file_name()?.to_string_lossy().to_lowercase();

        if let Some((_, file_type)) = COMPOUND_SUFFIXES
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix))
        {
            return Some(*file_type);
        }

        let extension = Path::new(&name).extension()?.to_str()?;
        match extension {
            "csv" => Some(Self::Csv),
            "tsv" | "txt" => Some(Self::Tsv),
            "h5" => Some(Self::H5),
            "h5ad" => Some(Self::H5ad),
            "mtx" => Some(Self::Mtx),
            "xlsx" | "xls" => Some(Self::Excel),
            "arrow" | "ipc" | "feather" => Some(Self::Ipc),
            _ => None,
        }
    }

    /// Whether this build can read the format into a data manager.
    pub fn is_loadable(&self) -> bool {
        match self {
            Self::Csv | Self::Tsv | Self::Mtx | Self::Ipc | Self::Excel => true,
            Self::H5ad => cfg!(feature = "h5ad"),
            Self::H5 => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::H5 => "h5",
            Self::H5ad => "h5ad",
            Self::Mtx => "mtx",
            Self::Excel => "excel",
            Self::Ipc => "ipc",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detects the type of a dataset path; directories holding a 10X matrix
/// count as [`FileType::Mtx`].
pub fn detect_dataset<P: AsRef<Path>>(path: P) -> Option<FileType> {
    let path = path.as_ref();
    if path.is_dir() {
        return find_first(path, "", &["matrix.mtx.gz", "matrix.mtx"]).map(|_| FileType::Mtx);
    }
    FileType::detect(path)
}

/// Reads a dataset into a data frame whose first column holds the
/// observation names.
pub fn read_dataset<P: AsRef<Path>>(
    path: P,
    file_type: FileType,
) -> anyhow::Result<DataFrame> {
    let path = path.as_ref();
    debug!("Reading {} as {}", path.display(), file_type);
    match file_type {
        FileType::Csv => read_delimited(path, b','),
        FileType::Tsv => read_delimited(path, b'\t'),
        FileType::Ipc => read_ipc(path),
        FileType::Mtx => read_10x_mtx(path)?.to_dataframe(),
        FileType::Excel => read_excel(path),
        FileType::H5ad => read_h5ad_frame(path),
        FileType::H5 => {
            bail!(
                "Loading {} files is not supported; convert {} to H5AD, CSV or 10X MTX",
                file_type,
                path.display()
            )
        },
    }
}

#[cfg(feature = "h5ad")]
fn read_h5ad_frame(path: &Path) -> anyhow::Result<DataFrame> {
    super::h5ad::read_h5ad(path)?.to_dataframe()
}

#[cfg(not(feature = "h5ad"))]
fn read_h5ad_frame(path: &Path) -> anyhow::Result<DataFrame> {
    bail!(
        "Reading {} needs a build with the `h5ad` feature",
        path.display()
    )
}

pub fn read_delimited(
    path: &Path,
    separator: u8,
) -> anyhow::Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .map_parse_options(|opts| opts.with_separator(separator))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(df)
}

static EMPTY_CELL: Data = Data::Empty;

/// Reads the first worksheet. The first row holds the column names; a
/// column with any text cell is kept as strings, the others become
/// `f64` with empty cells as nulls.
pub fn read_excel(path: &Path) -> anyhow::Result<DataFrame> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("opening {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("{} has no worksheets", path.display()))?
        .with_context(|| format!("reading {}", path.display()))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| anyhow!("{} is empty", path.display()))?;
    let names = header
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            match cell {
                Data::Empty => format!("column_{}", i + 1),
                other => other.to_string(),
            }
        })
        .collect_vec();
    let body = rows.collect_vec();

    let columns = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            excel_column(
                name,
                body.iter()
                    .map(move |row| row.get(j).unwrap_or(&EMPTY_CELL)),
            )
        })
        .collect_vec();
    Ok(DataFrame::new(columns)?)
}

fn excel_column<'a, I>(
    name: &str,
    cells: I,
) -> Column
where
    I: Iterator<Item = &'a Data> + Clone, {
    let numeric = cells.clone().all(|cell| {
        matches!(
            cell,
            Data::Int(_) | Data::Float(_) | Data::Bool(_) | Data::Empty
        )
    });
    let series = if numeric {
        let values = cells
            .map(|cell| {
                match cell {
                    Data::Int(v) => Some(*v as f64),
                    Data::Float(v) => Some(*v),
                    Data::Bool(v) => Some(f64::from(u8::from(*v))),
                    _ => None,
                }
            })
            .collect_vec();
        Series::new(name.into(), values)
    }
    else {
        let values = cells
            .map(|cell| {
                match cell {
                    Data::Empty => None,
                    other => Some(other.to_string()),
                }
            })
            .collect_vec();
        Series::new(name.into(), values)
    };
    Column::from(series)
}

pub fn read_ipc(path: &Path) -> anyhow::Result<DataFrame> {
    let file =
        File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(IpcReader::new(file).finish()?)
}

/// Writes a data frame, choosing the format by suffix.
pub fn write_dataframe<P: AsRef<Path>>(
    df: &mut DataFrame,
    path: P,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let separator = match extension.as_str() {
        "csv" => b',',
        "tsv" => b'\t',
        "arrow" | "ipc" => {
            let mut writer = BufWriter::new(File::create(path)?);
            IpcWriter::new(&mut writer).finish(df)?;
            return Ok(());
        },
        other => bail!("Unsupported file format: .{}", other),
    };

    let mut writer = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    CsvWriter::new(&mut writer)
        .include_header(true)
        .with_separator(separator)
        .finish(df)?;
    Ok(())
}

/// Largest matrix, in values, that is materialized densely (8 GiB of
/// `f64`).
pub const MAX_DENSE_VALUES: usize = 1 << 30;

const MAX_RESERVED_ENTRIES: usize = 1 << 20;

/// Densifies a compressed sparse matrix of the given shape. `by_row`
/// selects CSR, otherwise `indptr` runs over columns (CSC).
pub fn compressed_to_dense(
    shape: (usize, usize),
    data: &[f64],
    indices: &[u64],
    indptr: &[u64],
    by_row: bool,
) -> anyhow::Result<Array2<f64>> {
    let (n_rows, n_cols) = shape;
    dense_len(n_rows, n_cols)?;
    let (n_major, n_minor) = if by_row { (n_rows, n_cols) } else { (n_cols, n_rows) };
    ensure!(
        indptr.len() == n_major + 1,
        "Index pointer has {} entries, expected {}",
        indptr.len(),
        n_major + 1
    );
    ensure!(
        data.len() == indices.len(),
        "Sparse matrix has {} values but {} indices",
        data.len(),
        indices.len()
    );

    let mut x = Array2::<f64>::zeros(shape);
    for (major, bounds) in indptr.windows(2).enumerate() {
        let (start, end) = (bounds[0] as usize, bounds[1] as usize);
        ensure!(
            start <= end && end <= data.len(),
            "Malformed index pointer at {}",
            major
        );
        for k in start..end {
            let minor = indices[k] as usize;
            ensure!(minor < n_minor, "Sparse index {} out of range", minor);
            let cell = if by_row { [major, minor] } else { [minor, major] };
            x[cell] = data[k];
        }
    }
    Ok(x)
}

/// Number of values in a dense `rows x cols` matrix, refusing shapes above
/// [`MAX_DENSE_VALUES`].
pub fn dense_len(
    rows: usize,
    cols: usize,
) -> anyhow::Result<usize> {
    let len = rows
        .checked_mul(cols)
        .filter(|len| *len <= MAX_DENSE_VALUES)
        .ok_or_else(|| {
            anyhow!(
                "A {}x{} matrix exceeds the dense limit of {} values",
                rows,
                cols,
                MAX_DENSE_VALUES
            )
        })?;
    Ok(len)
}

fn find_first(
    dir: &Path,
    prefix: &str,
    names: &[&str],
) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(format!("{prefix}{name}")))
        .find(|candidate| candidate.is_file())
}

/// Reads a 10X Genomics matrix. `path` is either the directory or the
/// `matrix.mtx[.gz]` file itself, possibly with a sample prefix such as
/// `GSM1_matrix.mtx.gz` shared by its `features`/`barcodes` companions.
pub fn read_10x_mtx(path: &Path) -> anyhow::Result<ExpressionMatrix> {
    let (dir, prefix, matrix_path) = if path.is_dir() {
        let matrix = find_first(path, "", &["matrix.mtx.gz", "matrix.mtx"])
            .ok_or_else(|| anyhow!("No matrix.mtx found in {}", path.display()))?;
        (path.to_path_buf(), String::new(), matrix)
    }
    else {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let prefix = name
            .find("matrix.mtx")
            .map(|pos| name[..pos].to_string())
            .unwrap_or_default();
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        (dir, prefix, path.to_path_buf())
    };

    let (n_genes, n_cells, entries) = read_matrix_market(open_text(&matrix_path)?)
        .with_context(|| format!("parsing {}", matrix_path.display()))?;

    let features = find_first(
        &dir,
        &prefix,
        &[
            "features.tsv.gz",
            "features.tsv",
            "genes.tsv.gz",
            "genes.tsv",
        ],
    );
    let var_names = match features {
        Some(path) => {
            let rows = read_tsv_rows(&path)?;
            rows.into_iter()
                .map(|row| {
                    row.get(1)
                        .or_else(|| row.first())
                        .cloned()
                        .unwrap_or_default()
                })
                .collect_vec()
        },
        None => {
            warn!("No features file next to {}", matrix_path.display());
            (0..n_genes).map(|i| format!("gene_{i}")).collect_vec()
        },
    };

    let obs_names = match find_first(&dir, &prefix, &["barcodes.tsv.gz", "barcodes.tsv"]) {
        Some(path) => {
            read_tsv_rows(&path)?
                .into_iter()
                .map(|row| row.into_iter().next().unwrap_or_default())
                .collect_vec()
        },
        None => {
            warn!("No barcodes file next to {}", matrix_path.display());
            (0..n_cells).map(|i| format!("cell_{i}")).collect_vec()
        },
    };

    ensure!(
        var_names.len() == n_genes,
        "Matrix has {} genes but the features file lists {}",
        n_genes,
        var_names.len()
    );
    ensure!(
        obs_names.len() == n_cells,
        "Matrix has {} cells but the barcodes file lists {}",
        n_cells,
        obs_names.len()
    );

    // Matrix Market stores genes x cells; observations go into rows.
    dense_len(n_cells, n_genes)?;
    let mut x = Array2::<f64>::zeros((n_cells, n_genes));
    for (gene, cell, value) in entries {
        x[[cell, gene]] += value;
    }

    ExpressionMatrix::new(x, obs_names, make_unique(var_names))
}

fn read_tsv_rows(path: &Path) -> anyhow::Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(open_text(path)?);

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect_vec())
                .with_context(|| format!("reading {}", path.display()))
        })
        .collect()
}

/// Parses a coordinate Matrix Market stream into `(rows, cols, entries)`
/// with zero-based indices.
pub fn read_matrix_market<R: BufRead>(
    reader: R
) -> anyhow::Result<(usize, usize, Vec<(usize, usize, f64)>)> {
    let mut lines = reader.lines();

    let header = lines
        .next()
        .ok_or_else(|| anyhow!("Empty Matrix Market file"))??;
    let header_lc = header.to_lowercase();
    ensure!(
        header_lc.starts_with("%%matrixmarket matrix coordinate"),
        "Not a coordinate Matrix Market file: {}",
        header
    );
    let is_pattern = header_lc.contains("pattern");

    let mut dims: Option<(usize, usize, usize)> = None;
    let mut entries = Vec::new();

    for (line_no, line) in lines.enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        let fields = trimmed.split_whitespace().collect_vec();

        match dims {
            None => {
                ensure!(fields.len() >= 3, "Malformed size line: {}", trimmed);
                let parsed = fields[..3]
                    .iter()
                    .map(|v| v.parse::<usize>())
                    .collect::<Result<Vec<_>, _>>()
                    .with_context(|| format!("Malformed size line: {}", trimmed))?;
                dense_len(parsed[0], parsed[1])?;
                dims = Some((parsed[0], parsed[1], parsed[2]));
                entries.reserve(parsed[2].min(MAX_RESERVED_ENTRIES));
            },
            Some((n_rows, n_cols, _)) => {
                let expected = if is_pattern { 2 } else { 3 };
                ensure!(
                    fields.len() >= expected,
                    "Malformed entry on line {}: {}",
                    line_no + 2,
                    trimmed
                );
                let row: usize = fields[0].parse()?;
                let col: usize = fields[1].parse()?;
                ensure!(
                    (1..=n_rows).contains(&row) && (1..=n_cols).contains(&col),
                    "Entry ({}, {}) outside a {}x{} matrix",
                    row,
                    col,
                    n_rows,
                    n_cols
                );
                let value = if is_pattern { 1.0 } else { fields[2].parse::<f64>()? };
                entries.push((row - 1, col - 1, value));
            },
        }
    }

    let (n_rows, n_cols, nnz) = dims.ok_or_else(|| anyhow!("Missing size line"))?;
    if entries.len() != nnz {
        warn!(
            "Matrix Market header announces {} entries, found {}",
            nnz,
            entries.len()
        );
    }
    Ok((n_rows, n_cols, entries))
}

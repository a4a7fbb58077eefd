//! AnnData `.h5ad` reader.
//!
//! Only `X` and the obs/var indices are read. `X` may be a dense dataset
//! or a `csr_matrix`/`csc_matrix` group; layers, obsm and the annotation
//! columns are skipped.

use std::path::Path;

use anyhow::{
    bail,
    ensure,
    Context,
};
use hdf5::types::VarLenUnicode;
use hdf5::{
    File,
    Group,
};
use log::debug;
use ndarray::Array2;

use super::io::{
    compressed_to_dense,
    dense_len,
};
use super::matrix::{
    make_unique,
    ExpressionMatrix,
};

pub fn read_h5ad(path: &Path) -> anyhow::Result<ExpressionMatrix> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;

    let obs_names = read_index(&file, "obs")?;
    let var_names = read_index(&file, "var")?;
    debug!(
        "{}: {} observations, {} variables",
        path.display(),
        obs_names.len(),
        var_names.len()
    );

    let x = read_x(&file, (obs_names.len(), var_names.len()))
        .with_context(|| format!("reading X from {}", path.display()))?;
    ExpressionMatrix::new(x, obs_names, make_unique(var_names))
}

fn string_attr(
    group: &Group,
    name: &str,
) -> Option<String> {
    group
        .attr(name)
        .and_then(|attr| attr.read_scalar::<VarLenUnicode>())
        .map(|value| value.as_str().to_string())
        .ok()
}

/// Names stored in the dataframe group's index column (`_index` unless
/// the group's `_index` attribute says otherwise).
fn read_index(
    file: &File,
    name: &str,
) -> anyhow::Result<Vec<String>> {
    let group = file
        .group(name)
        .with_context(|| format!("missing {} group", name))?;
    let column = string_attr(&group, "_index").unwrap_or_else(|| "_index".to_string());
    let values = group
        .dataset(&column)
        .with_context(|| format!("missing {}/{}", name, column))?
        .read_raw::<VarLenUnicode>()?;
    Ok(values.iter().map(|v| v.as_str().to_string()).collect())
}

fn read_x(
    file: &File,
    shape: (usize, usize),
) -> anyhow::Result<Array2<f64>> {
    if let Ok(dataset) = file.dataset("X") {
        ensure!(
            dataset.shape() == [shape.0, shape.1],
            "X has shape {:?}, expected {:?}",
            dataset.shape(),
            shape
        );
        dense_len(shape.0, shape.1)?;
        let values = dataset.read_raw::<f64>()?;
        return Ok(Array2::from_shape_vec(shape, values)?);
    }

    let group = file.group("X").context("no X matrix")?;
    let by_row = match string_attr(&group, "encoding-type").as_deref() {
        Some("csr_matrix") => true,
        Some("csc_matrix") => false,
        other => bail!("Unsupported X encoding {:?}", other),
    };
    let data = group.dataset("data")?.read_raw::<f64>()?;
    let indices = group.dataset("indices")?.read_raw::<u64>()?;
    let indptr = group.dataset("indptr")?.read_raw::<u64>()?;
    compressed_to_dense(shape, &data, &indices, &indptr, by_row)
}

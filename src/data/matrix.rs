use std::collections::BTreeMap;
use std::fs::File;
use std::io::{
    BufWriter,
    Write,
};
use std::path::Path;

use anyhow::ensure;
use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;
use ndarray::{
    Array2,
    Axis,
};
use polars::prelude::{
    Column,
    DataFrame,
    DataType,
    NamedFrom,
    PolarsResult,
    Series,
};
use rayon::prelude::*;
use serde_json::Value;

use crate::utils::{
    getter_fn,
    n_threads,
    THREAD_POOL,
};

/// Name of the observation index column in frames produced by
/// [`ExpressionMatrix::to_dataframe`].
pub const INDEX_COLUMN: &str = "obs_names";

/// Observations x variables matrix with names and scalar annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMatrix {
    x:         Array2<f64>,
    obs_names: Vec<String>,
    var_names: Vec<String>,
    uns:       BTreeMap<String, Value>,
}

impl ExpressionMatrix {
    getter_fn!(x, Array2<f64>);

    getter_fn!(obs_names, Vec<String>);

    getter_fn!(var_names, Vec<String>);

    getter_fn!(uns, BTreeMap<String, Value>);

    pub fn new(
        x: Array2<f64>,
        obs_names: Vec<String>,
        var_names: Vec<String>,
    ) -> anyhow::Result<Self> {
        ensure!(
            x.nrows() == obs_names.len(),
            "Matrix has {} rows but {} observation names",
            x.nrows(),
            obs_names.len()
        );
        ensure!(
            x.ncols() == var_names.len(),
            "Matrix has {} columns but {} variable names",
            x.ncols(),
            var_names.len()
        );
        Ok(Self {
            x,
            obs_names,
            var_names,
            uns: BTreeMap::new(),
        })
    }

    /// Converts a frame into a matrix. A leading String column becomes the
    /// observation index, every other column is cast to `f64` with nulls,
    /// NaNs and unparseable strings set to 0.
    pub fn from_dataframe(df: &DataFrame) -> anyhow::Result<Self> {
        let columns = df.get_columns();
        let offset = index_offset(df);

        let obs_names = if offset == 1 {
            column_to_names(&columns[0])?
        }
        else {
            (0..df.height()).map(|i| i.to_string()).collect_vec()
        };
        let var_names = columns[offset..]
            .iter()
            .map(|c| c.name().to_string())
            .collect_vec();

        debug!(
            "Converting {} columns on {} threads",
            var_names.len(),
            n_threads()
        );
        let values = THREAD_POOL.install(|| {
            columns[offset..]
                .par_iter()
                .map(column_to_f64)
                .collect::<PolarsResult<Vec<_>>>()
        })?;

        let flat = values.into_iter().flatten().collect_vec();
        let x = Array2::from_shape_vec((var_names.len(), df.height()), flat)?
            .reversed_axes();

        Self::new(x, obs_names, var_names)
    }

    /// Frame with an [`INDEX_COLUMN`] followed by one `f64` column per
    /// variable.
    pub fn to_dataframe(&self) -> anyhow::Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.n_vars() + 1);
        columns.push(Column::from(Series::new(
            INDEX_COLUMN.into(),
            self.obs_names.clone(),
        )));
        for (name, values) in self.var_names.iter().zip(self.x.axis_iter(Axis(1))) {
            columns.push(Column::from(Series::new(
                name.as_str().into(),
                values.to_vec(),
            )));
        }
        Ok(DataFrame::new(columns)?)
    }

    pub fn uns_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.uns
    }

    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_vars(&self) -> usize {
        self.x.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_obs(), self.n_vars())
    }

    /// Sum of every observation row.
    pub fn total_counts(&self) -> Vec<f64> {
        self.x.sum_axis(Axis(1)).to_vec()
    }

    pub fn write_csv<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> anyhow::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_csv_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_csv_to<W: Write>(
        &self,
        writer: W,
    ) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(
            std::iter::once(INDEX_COLUMN).chain(self.var_names.iter().map(String::as_str)),
        )?;
        for (name, row) in self.obs_names.iter().zip(self.x.rows()) {
            writer.write_record(
                std::iter::once(name.clone()).chain(row.iter().map(|v| v.to_string())),
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// 1 when the first column is a String index followed by at least one
/// more column, else 0.
pub(crate) fn index_offset(df: &DataFrame) -> usize {
    match df.get_columns().first() {
        Some(first) if df.width() > 1 && first.dtype() == &DataType::String => 1,
        _ => 0,
    }
}

fn column_to_names(column: &Column) -> PolarsResult<Vec<String>> {
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.map(str::to_string).unwrap_or_else(|| i.to_string()))
        .collect())
}

pub(crate) fn column_to_f64(column: &Column) -> PolarsResult<Vec<f64>> {
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()).unwrap_or(0.0))
        .collect())
}

/// Suffixes repeated names with `-1`, `-2`, ... so that every name is
/// distinct. The first occurrence keeps its name.
pub fn make_unique(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let taken: hashbrown::HashSet<String> = names.iter().cloned().collect();
    let mut result = Vec::with_capacity(names.len());

    for name in names {
        let count = seen.entry(name.clone()).or_insert(0);
        if *count == 0 {
            *count = 1;
            result.push(name);
            continue;
        }
        let mut candidate = format!("{}-{}", name, count);
        while taken.contains(&candidate) {
            *count += 1;
            candidate = format!("{}-{}", name, count);
        }
        *count += 1;
        result.push(candidate);
    }
    result
}

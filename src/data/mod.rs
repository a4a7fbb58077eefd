//! Expression data handling.
//!
//! - [`matrix`]: the [`ExpressionMatrix`] observations x variables matrix.
//! - [`io`]: file type detection, readers and writers.
//! - `h5ad`: AnnData files, behind the `h5ad` feature.
//! - [`plots`]: Plotly figure history.
//! - [`provenance`]: processing log and tool usage records.
//! - [`DataManager`]: the workspace-backed owner of all of the above.

mod export;
#[cfg(feature = "h5ad")]
pub mod h5ad;
pub mod io;
mod manager;
pub mod matrix;
pub mod plots;
pub mod provenance;

pub use io::FileType;
pub use manager::{
    Category,
    DataManager,
    DataSummary,
    FileRecord,
    Metadata,
    WorkspaceStatus,
    DEFAULT_WORKSPACE_DIR,
};
pub use matrix::ExpressionMatrix;
pub use plots::{
    Plot,
    PlotInfo,
    PlotStore,
};
pub use provenance::{
    ProcessingHistory,
    ToolUsage,
};

pub use crate::client::{
    AgentClient,
    ClientOptions,
    ClientStatus,
    QueryResult,
    DEFAULT_AGENT,
};
pub use crate::config::{
    AgentConfig,
    AgentConfigurator,
    Credentials,
    LlmProvider,
    ModelConfig,
    ModelProvider,
    ModelTier,
    Settings,
};
pub use crate::data::{
    Category,
    DataManager,
    DataSummary,
    ExpressionMatrix,
    FileRecord,
    FileType,
    Metadata,
    Plot,
    PlotInfo,
    PlotStore,
    ProcessingHistory,
    ToolUsage,
    WorkspaceStatus,
};
pub use crate::llm::{
    connect,
    local_backend,
    BackendError,
    ChatBackend,
    ChatRequest,
    ChatResponse,
    Message,
    Role,
};
pub use crate::tools::{
    Article,
    GeoClient,
    GeoSeries,
    PubMedClient,
};
pub use crate::workspace::{
    FileEntry,
    FileInfo,
    UploadOutcome,
    WorkspaceError,
};

//! Drift orchestration: result types, workspace access, the optional
//! advisory pass and the synthesizer that ties the checks together.

pub mod advisory;
pub mod synth;
pub mod types;
pub mod workspace;

pub use advisory::{CompletionSource, Excerpt};
pub use synth::{ChangeSet, Synthesizer};
pub use types::{
    DriftReport, Finding, FindingSource, FindingType, RuleSummary, ScanMode, Severity,
    SeverityConfig, SkippedFile,
};
pub use workspace::{FsWorkspace, MemoryWorkspace, Workspace};

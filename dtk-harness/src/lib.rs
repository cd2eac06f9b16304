//! Core engine for the daemon testkit.
//!
//! Validates a security-sensitive background daemon by driving it through
//! its external build system under varying compile-time configurations and
//! classifying each observed result against a prediction:
//!
//! - [`outcome`]: the totally ordered result taxonomy and worst-case fold
//! - [`axis`] / [`matrix`]: parameter axes and their lazy cartesian product
//! - [`build`]: the external `make` driver with fresh-artifact checks
//! - [`pipeline`]: the gated clean/build/install/run sequence
//! - [`classify`]: pass/fail classification, failure log, run summary
//! - [`lifecycle`]: the single-instance background-process scenario
//!
//! Execution is deliberately single-threaded and sequential: build and
//! install mutate shared on-disk state, so one configuration finishes before
//! the next begins. The only true concurrency is the lifecycle scenario's
//! background daemon, which is owned, bounded and always reaped.

pub mod axis;
pub mod build;
pub mod classify;
pub mod lifecycle;
pub mod logging;
pub mod matrix;
pub mod options;
pub mod outcome;
pub mod paths;
pub mod pipeline;
pub mod transcript;

pub use axis::{Axis, AxisError, Candidate};
pub use build::{BuildArgs, BuildTool};
pub use classify::{ClassificationRecord, Classifier, RunReport, RunSummary, SuiteReport};
pub use lifecycle::{BackgroundProcess, LifecycleScenario};
pub use matrix::{ConfigMatrix, Configuration, MatrixError};
pub use options::Options;
pub use outcome::Outcome;
pub use paths::TestPaths;
pub use pipeline::{Pipeline, PipelineResult, Target};
pub use transcript::{FailureLog, Transcript};

//! coursegrade-core — grade classification and roster aggregation.
//!
//! This crate defines the course document model, the rule expression
//! evaluator, the score/attendance/assignment aggregators, and the
//! `CourseService` entry points that drive them against a record store.

pub mod assignments;
pub mod attendance;
pub mod classifier;
pub mod error;
pub mod expr;
pub mod model;
pub mod parser;
pub mod report;
pub mod scoring;
pub mod service;
pub mod statistics;
pub mod traits;

pub use classifier::{Classification, GradedStudent, GradingSystem};
pub use error::{GradingError, StoreError};
pub use model::{CourseDocument, GradeType, RawGradingRule, StudentRecord};
pub use service::CourseService;

//! Query planning subsystem
//!
//! Turns a find request into a plan the caller can execute:
//!
//! - the selector compiled into pushed SQL and a residual
//! - sort as `ORDER BY` or an in-memory sort
//! - skip and limit in SQL or in memory
//! - count as `COUNT(*)` or materialize-and-count
//!
//! # Design Principles
//!
//! - Deterministic: same inputs, same plan and same SQL text
//! - Sound: nothing placed in SQL can change which documents the in-memory
//!   matcher would return
//! - Total: planning never fails; malformed selectors degrade to constants

mod ast;
mod explain;
mod plan;
mod planner;

pub use ast::{Query, SortDirection, SortSpec};
pub use explain::ExplainPlan;
pub use plan::{sort_documents, CountStrategy, Pagination, QueryPlan};
pub use planner::SelectorCompiler;

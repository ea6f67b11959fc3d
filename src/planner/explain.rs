//! Explain plan output
//!
//! Deterministic, human-readable description of where each part of a query
//! runs.

use std::fmt;

use super::plan::QueryPlan;

/// Explain plan output
#[derive(Debug, Clone, PartialEq)]
pub struct ExplainPlan {
    pub collection: String,
    /// Pushed WHERE clause (`1=1` for match-all)
    pub sql: String,
    /// Bound arguments in placeholder order
    pub args: Vec<String>,
    /// Residual selector JSON
    pub residual: Option<String>,
    /// Conjuncts kept in memory
    pub declined: usize,
    /// Sort description (`age desc, name asc`)
    pub sort: Option<String>,
    /// `sql` or `memory`
    pub sort_placement: Option<&'static str>,
    pub pagination: &'static str,
    pub count: &'static str,
}

impl ExplainPlan {
    pub fn from_plan(plan: &QueryPlan) -> Self {
        let compiled = &plan.compiled;
        let args = compiled
            .sql
            .fragment()
            .map(|f| f.args.iter().map(ToString::to_string).collect())
            .unwrap_or_default();

        let sort = (!plan.sort.is_empty()).then(|| {
            plan.sort
                .iter()
                .map(|s| format!("{} {}", s.field, s.direction.as_str()))
                .collect::<Vec<_>>()
                .join(", ")
        });
        let sort_placement = sort.as_ref().map(|_| {
            if plan.sorts_in_memory() {
                "memory"
            } else {
                "sql"
            }
        });

        Self {
            collection: plan.collection.clone(),
            sql: compiled.sql.where_sql().to_string(),
            args,
            residual: compiled.residual_json().map(|r| r.to_string()),
            declined: compiled.declined,
            sort,
            sort_placement,
            pagination: plan.pagination.placement(),
            count: plan.count.as_str(),
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;
        writeln!(f, "Collection: {}", self.collection)?;
        writeln!(f, "SQL: {}", self.sql)?;
        if !self.args.is_empty() {
            writeln!(f, "Args: [{}]", self.args.join(", "))?;
        }
        match &self.residual {
            Some(residual) => {
                writeln!(f, "Residual: {}", residual)?;
                writeln!(f, "Declined Conjuncts: {}", self.declined)?;
            }
            None => writeln!(f, "Residual: none")?,
        }
        if let (Some(sort), Some(placement)) = (&self.sort, self.sort_placement) {
            writeln!(f, "Sort: {} ({})", sort, placement)?;
        }
        writeln!(f, "Pagination: {}", self.pagination)?;
        writeln!(f, "Count: {}", self.count)?;
        Ok(())
    }
}

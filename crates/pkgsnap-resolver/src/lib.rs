mod apply;
mod constraints;
mod installed;
mod job;
mod order;
mod plan;
mod repository_solver;
mod resolve;
mod search;
mod solver;
mod types;

pub use job::{JobFlags, JobKind, JobSet, JobTarget, MatchStyle};
pub use plan::{ActionKind, ApplyReport, Plan, PlannedAction};
pub use repository_solver::RepositorySolver;
pub use resolve::{resolve_dependency_graph_with_installed, select_highest_compatible};
pub use solver::Solver;
pub use types::{ResolvedGraph, RootRequirement};

#[cfg(test)]
mod tests;

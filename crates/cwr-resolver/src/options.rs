use cwr_store::GraphMethod;

/// How the first level of the graph is obtained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResolveStrategy {
    /// Ask the repository to expand the graph, then walk the leftovers.
    #[default]
    GraphExpansion,
    /// Fetch the root by batch search and walk everything client-side.
    BatchWalk,
}

/// Options for a single resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResolveOptions {
    /// Maximum number of client-side batch rounds.
    pub max_depth: usize,
    /// Include nested child datasets.
    pub include_nested: bool,
    /// Only the workflow-relevant part of the graph.
    pub workflow_only: bool,
    pub strategy: ResolveStrategy,
}

impl ResolveOptions {
    pub fn nested(mut self, include_nested: bool) -> Self {
        self.include_nested = include_nested;
        self
    }

    pub fn workflow_only(mut self, workflow_only: bool) -> Self {
        self.workflow_only = workflow_only;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn strategy(mut self, strategy: ResolveStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn graph_method(&self) -> GraphMethod {
        GraphMethod::select(self.include_nested, self.workflow_only)
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            include_nested: false,
            workflow_only: false,
            strategy: ResolveStrategy::default(),
        }
    }
}

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_core::logging::{init_logging, LoggingConfig};
use tessera_core::{Graph, MemoryReport};
use tessera_graph::{OptimizationLevel, OptimizationStats, Optimizer, RewriteConfig};
use tessera_providers::CpuRuntime;
use tracing::{debug, info};

/// Options for configuring a planning session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    optimization_level: OptimizationLevel,
    rewrite: RewriteConfig,
    validate_before: bool,
    validate_after: bool,
    logging: Option<LoggingConfig>,
}

impl SessionOptions {
    /// Create new session options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Set optimization level
    pub fn with_optimization_level(mut self, level: OptimizationLevel) -> Self {
        self.optimization_level = level;
        self
    }

    /// Set the transpose rewrite safety switches
    pub fn with_rewrite_config(mut self, rewrite: RewriteConfig) -> Self {
        self.rewrite = rewrite;
        self
    }

    /// Validate the graph before optimizing
    pub fn with_validate_before(mut self, enable: bool) -> Self {
        self.validate_before = enable;
        self
    }

    /// Validate the graph after shape inference
    pub fn with_validate_after(mut self, enable: bool) -> Self {
        self.validate_after = enable;
        self
    }

    /// Install a global subscriber with this config when the session is created
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Get optimization level
    pub fn optimization_level(&self) -> OptimizationLevel {
        self.optimization_level
    }

    /// Get rewrite switches
    pub fn rewrite_config(&self) -> RewriteConfig {
        self.rewrite
    }

    /// Whether the graph is validated before optimizing
    pub fn validate_before(&self) -> bool {
        self.validate_before
    }

    /// Whether the graph is validated after shape inference
    pub fn validate_after(&self) -> bool {
        self.validate_after
    }

    /// Get logging config, if any
    pub fn logging(&self) -> Option<&LoggingConfig> {
        self.logging.as_ref()
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            optimization_level: OptimizationLevel::O1,
            rewrite: RewriteConfig::default(),
            validate_before: true,
            validate_after: true,
            logging: None,
        }
    }
}

/// Outcome of [`PlanningSession::plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// What the rewrite passes changed.
    pub optimization: OptimizationStats,
    /// Arena usage after planning.
    pub memory: MemoryReport,
    /// Operators left in the graph.
    pub operators: usize,
    /// Tensors bound into the arena.
    pub tensors: usize,
}

/// Runs the planning pipeline over graphs.
#[derive(Debug)]
pub struct PlanningSession {
    options: SessionOptions,
    optimizer: Optimizer,
}

impl PlanningSession {
    /// Create a session, installing logging if the options ask for it.
    pub fn new(options: SessionOptions) -> Self {
        if let Some(logging) = options.logging() {
            if !init_logging(logging) {
                debug!("global subscriber already installed");
            }
        }
        let optimizer = Optimizer::with_config(options.optimization_level, options.rewrite);
        Self { options, optimizer }
    }

    /// Session options.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Empty graph backed by host memory.
    pub fn create_graph(&self) -> Graph {
        Graph::new(Arc::new(CpuRuntime::new()))
    }

    /// Validate, optimize, infer shapes, validate again and place every tensor.
    ///
    /// A failure at any step leaves the graph unusable for planning.
    pub fn plan(&self, graph: &mut Graph) -> Result<PlanSummary> {
        info!(
            "Planning graph with {} operators and {} tensors",
            graph.num_operators(),
            graph.num_tensors()
        );

        if self.options.validate_before {
            graph.check_valid()?;
        }

        let optimization = self.optimizer.optimize(graph)?;

        graph.infer_shapes()?;
        if self.options.validate_after {
            graph.check_valid()?;
        }

        let memory = graph.plan_memory()?;
        let summary = PlanSummary {
            optimization,
            memory,
            operators: graph.num_operators(),
            tensors: graph.num_tensors(),
        };
        debug!(?summary, "plan complete");
        Ok(summary)
    }
}

impl Default for PlanningSession {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

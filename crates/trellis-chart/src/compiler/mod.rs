//! Chart compiler
//!
//! Assembles the complete resource graph for a topology by delegating to the
//! specialized compilers in dependency order:
//!
//! ```text
//! DatabaseCompiler ──► env::compile ──► ApplicationCompiler ──┬──► HttpCacheCompiler
//!   (optional)          (DatabaseRef)     (Routing)           └──► IngressCompiler (optional)
//! ```
//!
//! Feature flags are read once, when [`ChartCompilerBuilder::build`] fixes
//! the [`Pipeline`]. Identifiers flow between stages as return values; no
//! stage sees another's output except through the assembler.
//!
//! # Usage
//!
//! ```text
//! let compiler = ChartCompiler::builder().frontend(false).build();
//! let graph = compiler.compile(&options)?;
//! let yaml = graph.to_yaml()?;
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use trellis_common::Result;

use crate::database::{CompiledDatabase, DatabaseCompiler};
use crate::env;
use crate::graph::ResourceGraph;
use crate::httpcache::HttpCacheCompiler;
use crate::ingress::IngressCompiler;
use crate::k8s::EnvVar;
use crate::options::TopologyOptions;
use crate::workload::{ApplicationCompiler, CompiledApplication};

/// Generation-time capability flags
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    /// Generate the Volto frontend
    pub frontend: bool,
    /// Generate the Varnish HTTP cache
    pub cache: bool,
    /// Generate a CloudNativePG cluster for the backend
    pub managed_database: bool,
    /// Generate Ingress resources
    pub ingress: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            frontend: true,
            cache: true,
            managed_database: true,
            ingress: true,
        }
    }
}

type TopologyStage = fn(&TopologyOptions, Vec<EnvVar>) -> CompiledApplication;

/// Fixed sequence of composer calls selected from [`Features`]
#[derive(Clone, Copy)]
pub struct Pipeline {
    database: bool,
    topology: TopologyStage,
    cache: bool,
    ingress: bool,
}

impl Pipeline {
    fn from_features(features: Features) -> Self {
        let topology: TopologyStage = if features.frontend {
            ApplicationCompiler::compile_with_frontend
        } else {
            ApplicationCompiler::compile_backend_only
        };
        Self {
            database: features.managed_database,
            topology,
            cache: features.cache,
            ingress: features.ingress,
        }
    }
}

/// Builder fixing the feature set of a [`ChartCompiler`]
#[derive(Clone, Copy, Debug, Default)]
pub struct ChartCompilerBuilder {
    features: Features,
}

impl ChartCompilerBuilder {
    /// Include or omit the frontend
    pub fn frontend(mut self, enabled: bool) -> Self {
        self.features.frontend = enabled;
        self
    }

    /// Include or omit the HTTP cache
    pub fn cache(mut self, enabled: bool) -> Self {
        self.features.cache = enabled;
        self
    }

    /// Include or omit the managed database
    pub fn managed_database(mut self, enabled: bool) -> Self {
        self.features.managed_database = enabled;
        self
    }

    /// Include or omit ingress
    pub fn ingress(mut self, enabled: bool) -> Self {
        self.features.ingress = enabled;
        self
    }

    /// Replace the whole feature set
    pub fn features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Fix the pipeline
    pub fn build(self) -> ChartCompiler {
        ChartCompiler {
            features: self.features,
            pipeline: Pipeline::from_features(self.features),
        }
    }
}

/// Assembles a [`ResourceGraph`] from [`TopologyOptions`]
pub struct ChartCompiler {
    features: Features,
    pipeline: Pipeline,
}

impl ChartCompiler {
    /// Start a builder with every feature enabled
    pub fn builder() -> ChartCompilerBuilder {
        ChartCompilerBuilder::default()
    }

    /// Feature set this compiler was built with
    pub fn features(&self) -> Features {
        self.features
    }

    /// Compile the chart.
    ///
    /// Emission order: database cluster, application workloads, cache,
    /// ingress. Each stage runs at most once.
    ///
    /// # Errors
    ///
    /// Returns `Error::Precondition` if a stage receives unusable upstream
    /// identifiers or two stages emit the same resource.
    pub fn compile(&self, options: &TopologyOptions) -> Result<ResourceGraph> {
        info!(
            chart = %options.chart_name,
            domain = %options.domain,
            features = ?self.features,
            "assembling chart"
        );

        let database = self.pipeline.database.then(|| {
            let db = DatabaseCompiler::compile(
                &options.chart_name,
                options.namespace.as_deref(),
                &options.database,
            );
            debug!(
                service = %db.service_name,
                secret = %db.secret_name,
                instances = options.database.instances,
                "compiled database cluster"
            );
            db
        });

        let database_ref = database.as_ref().map(CompiledDatabase::reference);
        let environment = env::compile(database_ref.as_ref());
        debug!(entries = environment.len(), "compiled backend environment");

        let application = (self.pipeline.topology)(options, environment);
        debug!(
            backend = %application.routing.backend().name,
            frontend = application.routing.frontend().map(|f| f.name.as_str()),
            "compiled application topology"
        );

        let cache = self
            .pipeline
            .cache
            .then(|| HttpCacheCompiler::compile(options, &application));

        let ingresses = if self.pipeline.ingress {
            let ingresses = IngressCompiler::compile(options, &application.routing)?;
            debug!(count = ingresses.len(), "compiled ingress");
            ingresses
        } else {
            Vec::new()
        };

        let mut graph = ResourceGraph::new();
        if let Some(db) = database {
            graph.insert(db.cluster)?;
        }
        for workload in application.workloads {
            graph.insert(workload.deployment)?;
            graph.insert(workload.service)?;
        }
        if let Some(cache) = cache {
            graph.insert(cache.config_map)?;
            graph.insert(cache.deployment)?;
            graph.insert(cache.service)?;
        }
        for ingress in ingresses {
            graph.insert(ingress)?;
        }

        info!(resources = graph.len(), "chart assembled");
        Ok(graph)
    }
}

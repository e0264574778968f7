//! Application topology composition
//!
//! Generates the Plone backend and (optionally) frontend workloads: one
//! Deployment and one ClusterIP Service each. Both run the same image and
//! select their role through container args.
//!
//! Whether a frontend exists is decided by which entry point the assembler
//! calls, [`ApplicationCompiler::compile_backend_only`] or
//! [`ApplicationCompiler::compile_with_frontend`]. The result carries a
//! [`Routing`] value so downstream composers never null-check a frontend.

use std::collections::BTreeMap;

use trellis_common::kube_utils::ObjectMeta;
use trellis_common::{LABEL_COMPONENT, LABEL_NAME, LABEL_VERSION};

use crate::k8s::{
    Container, ContainerPort, Deployment, EnvVar, HttpGetAction, PodSpec, ProbeSpec, Service,
};
use crate::options::TopologyOptions;

/// Port the backend listens on
pub const BACKEND_PORT: u16 = 8080;

/// Port the frontend listens on
pub const FRONTEND_PORT: u16 = 3000;

/// Plone site id the frontend talks to on the backend
const SITE_ID: &str = "Plone";

// =============================================================================
// Published identifiers
// =============================================================================

/// A routable workload endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceRef {
    /// Service name
    pub name: String,
    /// Service port
    pub port: u16,
}

impl ServiceRef {
    /// Create a new service reference
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }

    /// In-cluster HTTP URL of this service
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.name, self.port)
    }
}

/// Which workloads can receive traffic
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Routing {
    /// Backend serves everything (Classic UI)
    BackendOnly {
        /// Backend service
        backend: ServiceRef,
    },
    /// Frontend serves pages, backend serves the API
    Split {
        /// Backend service
        backend: ServiceRef,
        /// Frontend service
        frontend: ServiceRef,
    },
}

impl Routing {
    /// The backend service, present in every topology
    pub fn backend(&self) -> &ServiceRef {
        match self {
            Self::BackendOnly { backend } | Self::Split { backend, .. } => backend,
        }
    }

    /// The frontend service, if this topology has one
    pub fn frontend(&self) -> Option<&ServiceRef> {
        match self {
            Self::BackendOnly { .. } => None,
            Self::Split { frontend, .. } => Some(frontend),
        }
    }
}

// =============================================================================
// Compiled output
// =============================================================================

/// Deployment + Service for one role
#[derive(Clone, Debug)]
pub struct CompiledWorkload {
    /// Deployment
    pub deployment: Deployment,
    /// Service exposing the deployment
    pub service: Service,
}

/// Output of the application compiler
#[derive(Clone, Debug)]
pub struct CompiledApplication {
    /// Workloads in emission order (backend first)
    pub workloads: Vec<CompiledWorkload>,
    /// Published service identifiers
    pub routing: Routing,
}

// =============================================================================
// Application Compiler
// =============================================================================

/// Compiler for the Plone backend/frontend workloads
pub struct ApplicationCompiler;

impl ApplicationCompiler {
    /// Compile a backend-only topology
    pub fn compile_backend_only(
        options: &TopologyOptions,
        environment: Vec<EnvVar>,
    ) -> CompiledApplication {
        let (backend, backend_ref) = Self::compile_backend(options, environment);
        CompiledApplication {
            workloads: vec![backend],
            routing: Routing::BackendOnly {
                backend: backend_ref,
            },
        }
    }

    /// Compile a backend + frontend topology
    pub fn compile_with_frontend(
        options: &TopologyOptions,
        environment: Vec<EnvVar>,
    ) -> CompiledApplication {
        let (backend, backend_ref) = Self::compile_backend(options, environment);
        let (frontend, frontend_ref) = Self::compile_frontend(options, &backend_ref);
        CompiledApplication {
            workloads: vec![backend, frontend],
            routing: Routing::Split {
                backend: backend_ref,
                frontend: frontend_ref,
            },
        }
    }

    fn compile_backend(
        options: &TopologyOptions,
        environment: Vec<EnvVar>,
    ) -> (CompiledWorkload, ServiceRef) {
        let mut container = Container::new(
            "backend",
            &options.image,
            ContainerPort::tcp("http", BACKEND_PORT),
        );
        container.args = Some(vec!["start-backend".to_string()]);
        container.env = environment;
        container.readiness_probe = Some(http_probe("/", BACKEND_PORT, 10));

        let name = options.resource_name("backend");
        let workload = compile_workload(
            options,
            &name,
            "backend",
            options.backend_replicas,
            container,
            BACKEND_PORT,
        );
        (workload, ServiceRef::new(name, BACKEND_PORT))
    }

    fn compile_frontend(
        options: &TopologyOptions,
        backend: &ServiceRef,
    ) -> (CompiledWorkload, ServiceRef) {
        let mut container = Container::new(
            "frontend",
            &options.image,
            ContainerPort::tcp("http", FRONTEND_PORT),
        );
        container.args = Some(vec!["start-frontend".to_string()]);
        container.env = vec![EnvVar::literal(
            "RAZZLE_INTERNAL_API_PATH",
            format!("{}/{}", backend.url(), SITE_ID),
        )];
        container.readiness_probe = Some(http_probe("/", FRONTEND_PORT, 5));

        let name = options.resource_name("frontend");
        let workload = compile_workload(
            options,
            &name,
            "frontend",
            options.frontend_replicas,
            container,
            FRONTEND_PORT,
        );
        (workload, ServiceRef::new(name, FRONTEND_PORT))
    }
}

/// Build the Deployment/Service pair shared by every role
fn compile_workload(
    options: &TopologyOptions,
    name: &str,
    component: &str,
    replicas: u32,
    container: Container,
    port: u16,
) -> CompiledWorkload {
    let selector = BTreeMap::from([
        (LABEL_NAME.to_string(), name.to_string()),
        (LABEL_COMPONENT.to_string(), component.to_string()),
    ]);

    let metadata = ObjectMeta::new(name, options.namespace.as_deref())
        .with_label(LABEL_COMPONENT, component)
        .with_label(LABEL_VERSION, &options.image_tag);

    let deployment = Deployment::new(
        metadata.clone(),
        replicas,
        selector.clone(),
        PodSpec {
            containers: vec![container],
            volumes: vec![],
        },
    );
    let service = Service::cluster_ip(metadata, selector, "http", port);

    CompiledWorkload {
        deployment,
        service,
    }
}

pub(crate) fn http_probe(path: &str, port: u16, initial_delay: i32) -> ProbeSpec {
    ProbeSpec {
        http_get: HttpGetAction {
            path: path.to_string(),
            port,
        },
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> TopologyOptions {
        TopologyOptions::new("x.example.com")
    }

    #[test]
    fn backend_only_publishes_backend_on_8080() {
        let app = ApplicationCompiler::compile_backend_only(&options(), vec![]);
        assert_eq!(app.workloads.len(), 1);
        assert_eq!(
            app.routing,
            Routing::BackendOnly {
                backend: ServiceRef::new("plone-backend", 8080)
            }
        );
        assert!(app.routing.frontend().is_none());
    }

    #[test]
    fn with_frontend_publishes_both_services() {
        let app = ApplicationCompiler::compile_with_frontend(&options(), vec![]);
        assert_eq!(app.workloads.len(), 2);
        assert_eq!(app.routing.backend().port, 8080);
        let frontend = app.routing.frontend().expect("frontend should be routed");
        assert_eq!(frontend.name, "plone-frontend");
        assert_eq!(frontend.port, 3000);
    }

    #[test]
    fn backend_gets_environment_and_args() {
        let env = vec![EnvVar::literal("INSTANCE_db_storage", "relstorage")];
        let app = ApplicationCompiler::compile_backend_only(&options(), env.clone());
        let container = &app.workloads[0].deployment.spec.template.spec.containers[0];
        assert_eq!(container.env, env);
        assert_eq!(container.args, Some(vec!["start-backend".to_string()]));
        assert_eq!(container.image, "ghcr.io/plone/plone:latest");
    }

    #[test]
    fn frontend_points_at_backend_service() {
        let app = ApplicationCompiler::compile_with_frontend(&options(), vec![]);
        let container = &app.workloads[1].deployment.spec.template.spec.containers[0];
        assert_eq!(container.args, Some(vec!["start-frontend".to_string()]));
        assert_eq!(
            container.env[0].value.as_deref(),
            Some("http://plone-backend:8080/Plone")
        );
    }

    #[test]
    fn zero_backend_replicas_is_allowed() {
        let mut opts = options();
        opts.backend_replicas = 0;
        let app = ApplicationCompiler::compile_backend_only(&opts, vec![]);
        assert_eq!(app.workloads[0].deployment.spec.replicas, 0);
    }

    #[test]
    fn replica_counts_follow_options() {
        let mut opts = options();
        opts.backend_replicas = 3;
        opts.frontend_replicas = 4;
        let app = ApplicationCompiler::compile_with_frontend(&opts, vec![]);
        assert_eq!(app.workloads[0].deployment.spec.replicas, 3);
        assert_eq!(app.workloads[1].deployment.spec.replicas, 4);
    }

    #[test]
    fn service_selects_deployment_pods() {
        let app = ApplicationCompiler::compile_backend_only(&options(), vec![]);
        let workload = &app.workloads[0];
        assert_eq!(
            workload.service.spec.selector,
            workload.deployment.spec.template.metadata.labels
        );
        assert_eq!(workload.service.metadata.name, app.routing.backend().name);
    }

    #[test]
    fn version_label_uses_image_tag() {
        let mut opts = options();
        opts.image_tag = "6.1.0".to_string();
        let app = ApplicationCompiler::compile_backend_only(&opts, vec![]);
        assert_eq!(
            app.workloads[0].deployment.metadata.labels.get(LABEL_VERSION),
            Some(&"6.1.0".to_string())
        );
    }
}

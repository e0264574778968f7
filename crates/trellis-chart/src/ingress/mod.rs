//! Ingress composition for north-south traffic
//!
//! Generates `networking.k8s.io/v1` Ingress resources:
//! - **main**: the public domain. With a frontend, `/++api++` goes to the
//!   backend and everything else to the frontend; without one, the backend
//!   serves every path.
//! - **maintenance** (optional): a second host that always reaches the
//!   backend directly, bypassing frontend and cache.
//!
//! Path order matters: ingress controllers pick the first matching rule, so
//! the API prefix is built before the catch-all and the list is never sorted.
//!
//! When a cert-manager issuer is configured, every emitted Ingress carries
//! the `cert-manager.io/cluster-issuer` annotation and a TLS block whose
//! secret is `<host>-tls`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trellis_common::impl_api_defaults;
use trellis_common::kube_utils::{HasApiResource, ObjectMeta};
use trellis_common::{Error, Result, LABEL_COMPONENT};

use crate::options::TopologyOptions;
use crate::workload::{Routing, ServiceRef};

/// Annotation cert-manager watches to issue certificates for an Ingress
pub const CLUSTER_ISSUER_ANNOTATION: &str = "cert-manager.io/cluster-issuer";

/// Path prefix of the Plone REST API
pub const API_PATH: &str = "/++api++";

/// Catch-all path
pub const ROOT_PATH: &str = "/";

// =============================================================================
// Ingress Types
// =============================================================================

/// Kubernetes Ingress resource
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ingress {
    /// API version (networking.k8s.io/v1)
    #[serde(default = "Ingress::default_api_version")]
    pub api_version: String,
    /// Resource kind (Ingress)
    #[serde(default = "Ingress::default_kind")]
    pub kind: String,
    /// Resource metadata
    pub metadata: ObjectMeta,
    /// Ingress specification
    pub spec: IngressSpec,
}

impl HasApiResource for Ingress {
    const API_VERSION: &'static str = "networking.k8s.io/v1";
    const KIND: &'static str = "Ingress";
}

impl_api_defaults!(Ingress);

impl Ingress {
    /// Create a new Ingress
    pub fn new(metadata: ObjectMeta, spec: IngressSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
        }
    }
}

/// Ingress spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    /// TLS bindings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tls: Vec<IngressTls>,
    /// Host rules
    pub rules: Vec<IngressRule>,
}

/// TLS binding for a set of hosts
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressTls {
    /// Hosts covered by the certificate
    pub hosts: Vec<String>,
    /// Secret cert-manager stores the certificate in
    pub secret_name: String,
}

/// Rules for one host
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    /// Host to match
    pub host: String,
    /// HTTP paths
    pub http: HttpIngressRuleValue,
}

/// Ordered HTTP paths of a rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressRuleValue {
    /// Paths, first match wins
    pub paths: Vec<HttpIngressPath>,
}

/// Path to backend mapping
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressPath {
    /// Path value
    pub path: String,
    /// Match type (Prefix, Exact)
    pub path_type: String,
    /// Target service
    pub backend: IngressBackend,
}

impl HttpIngressPath {
    /// Prefix match on `path` routed to `service`
    pub fn prefix(path: &str, service: &ServiceRef) -> Self {
        Self {
            path: path.to_string(),
            path_type: "Prefix".to_string(),
            backend: IngressBackend {
                service: IngressServiceBackend {
                    name: service.name.clone(),
                    port: ServiceBackendPort {
                        number: service.port,
                    },
                },
            },
        }
    }

    /// The service this path routes to
    pub fn target(&self) -> ServiceRef {
        ServiceRef::new(
            self.backend.service.name.clone(),
            self.backend.service.port.number,
        )
    }
}

/// Ingress backend
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IngressBackend {
    /// Service backend
    pub service: IngressServiceBackend,
}

/// Service backend of an ingress path
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IngressServiceBackend {
    /// Service name
    pub name: String,
    /// Service port
    pub port: ServiceBackendPort,
}

/// Numeric service port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServiceBackendPort {
    /// Port number
    pub number: u16,
}

// =============================================================================
// Ingress Compiler
// =============================================================================

/// Compiler for the main and maintenance Ingress resources
pub struct IngressCompiler;

impl IngressCompiler {
    /// Compile ingress resources for a routing topology.
    ///
    /// # Errors
    ///
    /// Returns `Error::Precondition` if the backend reference is unusable
    /// (empty name or port 0). The assembler must always pass the backend
    /// the application compiler published.
    pub fn compile(options: &TopologyOptions, routing: &Routing) -> Result<Vec<Ingress>> {
        let backend = routing.backend();
        check_service_ref(backend, "backend")?;
        if let Some(frontend) = routing.frontend() {
            check_service_ref(frontend, "frontend")?;
        }

        let annotations = Self::annotations(options);
        let mut output = vec![Self::compile_host(
            options,
            &options.resource_name("ingress-main"),
            &options.domain,
            Self::main_paths(routing),
            &annotations,
        )];

        if let Some(ref maintenance) = options.domain_maintenance {
            output.push(Self::compile_host(
                options,
                &options.resource_name("ingress-maintenance"),
                maintenance,
                vec![HttpIngressPath::prefix(ROOT_PATH, backend)],
                &annotations,
            ));
        }

        Ok(output)
    }

    /// Paths for the public domain, most specific first
    fn main_paths(routing: &Routing) -> Vec<HttpIngressPath> {
        match routing {
            Routing::Split { backend, frontend } => vec![
                HttpIngressPath::prefix(API_PATH, backend),
                HttpIngressPath::prefix(ROOT_PATH, frontend),
            ],
            Routing::BackendOnly { backend } => vec![HttpIngressPath::prefix(ROOT_PATH, backend)],
        }
    }

    /// Annotations shared by every emitted Ingress
    fn annotations(options: &TopologyOptions) -> BTreeMap<String, String> {
        let mut annotations = BTreeMap::new();
        if let Some(ref issuer) = options.cert_issuer {
            annotations.insert(CLUSTER_ISSUER_ANNOTATION.to_string(), issuer.clone());
        }
        annotations
    }

    fn compile_host(
        options: &TopologyOptions,
        name: &str,
        host: &str,
        paths: Vec<HttpIngressPath>,
        annotations: &BTreeMap<String, String>,
    ) -> Ingress {
        let tls = if options.cert_issuer.is_some() {
            vec![IngressTls {
                hosts: vec![host.to_string()],
                secret_name: format!("{}-tls", host),
            }]
        } else {
            vec![]
        };

        Ingress::new(
            ObjectMeta::new(name, options.namespace.as_deref())
                .with_label(LABEL_COMPONENT, "ingress")
                .with_annotations(annotations.clone()),
            IngressSpec {
                tls,
                rules: vec![IngressRule {
                    host: host.to_string(),
                    http: HttpIngressRuleValue { paths },
                }],
            },
        )
    }
}

fn check_service_ref(service: &ServiceRef, role: &str) -> Result<()> {
    if service.name.is_empty() {
        return Err(Error::precondition(
            "ingress",
            format!("{} service name is empty", role),
        ));
    }
    if service.port == 0 {
        return Err(Error::precondition(
            "ingress",
            format!("{} service '{}' has port 0", role, service.name),
        ));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> ServiceRef {
        ServiceRef::new("plone-backend", 8080)
    }

    fn frontend() -> ServiceRef {
        ServiceRef::new("plone-frontend", 3000)
    }

    fn split() -> Routing {
        Routing::Split {
            backend: backend(),
            frontend: frontend(),
        }
    }

    fn backend_only() -> Routing {
        Routing::BackendOnly { backend: backend() }
    }

    fn paths(ingress: &Ingress) -> &[HttpIngressPath] {
        &ingress.spec.rules[0].http.paths
    }

    #[test]
    fn frontend_split_puts_api_before_catch_all() {
        let options = TopologyOptions::new("x.example.com");
        let output = IngressCompiler::compile(&options, &split()).expect("should compile");

        assert_eq!(output.len(), 1);
        let main = &output[0];
        assert_eq!(main.metadata.name, "plone-ingress-main");
        assert_eq!(main.spec.rules.len(), 1);
        assert_eq!(main.spec.rules[0].host, "x.example.com");

        let paths = paths(main);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].path, "/++api++");
        assert_eq!(paths[0].path_type, "Prefix");
        assert_eq!(paths[0].target(), backend());
        assert_eq!(paths[1].path, "/");
        assert_eq!(paths[1].target(), frontend());
    }

    #[test]
    fn backend_only_routes_everything_to_backend() {
        let options = TopologyOptions::new("x.example.com");
        let output = IngressCompiler::compile(&options, &backend_only()).expect("should compile");

        let paths = paths(&output[0]);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].path, "/");
        assert_eq!(paths[0].target(), backend());
    }

    #[test]
    fn no_tls_or_annotation_without_issuer() {
        let mut options = TopologyOptions::new("x.example.com");
        options.domain_maintenance = Some("admin.x.example.com".to_string());
        let output = IngressCompiler::compile(&options, &split()).expect("should compile");

        for ingress in &output {
            assert!(ingress.spec.tls.is_empty());
            assert!(ingress.metadata.annotations.is_empty());
        }
        let json = serde_json::to_value(&output[0]).expect("ingress should serialize");
        assert!(json["spec"].get("tls").is_none());
    }

    #[test]
    fn issuer_adds_tls_and_annotation_to_every_ingress() {
        let mut options = TopologyOptions::new("x.example.com");
        options.domain_maintenance = Some("admin.x.example.com".to_string());
        options.cert_issuer = Some("letsencrypt-prod".to_string());
        let output = IngressCompiler::compile(&options, &split()).expect("should compile");

        assert_eq!(output.len(), 2);
        for (ingress, host) in output.iter().zip(["x.example.com", "admin.x.example.com"]) {
            assert_eq!(
                ingress.metadata.annotations.get(CLUSTER_ISSUER_ANNOTATION),
                Some(&"letsencrypt-prod".to_string())
            );
            assert_eq!(ingress.spec.tls.len(), 1);
            assert_eq!(ingress.spec.tls[0].hosts, vec![host.to_string()]);
            assert_eq!(ingress.spec.tls[0].secret_name, format!("{}-tls", host));
        }
    }

    #[test]
    fn maintenance_always_targets_backend() {
        let mut options = TopologyOptions::new("x.example.com");
        options.domain_maintenance = Some("admin.x.example.com".to_string());

        for routing in [split(), backend_only()] {
            let output = IngressCompiler::compile(&options, &routing).expect("should compile");
            let maintenance = &output[1];
            assert_eq!(maintenance.metadata.name, "plone-ingress-maintenance");
            assert_eq!(maintenance.spec.rules[0].host, "admin.x.example.com");
            let paths = paths(maintenance);
            assert_eq!(paths.len(), 1);
            assert_eq!(paths[0].path, "/");
            assert_eq!(paths[0].target(), backend());
        }
    }

    #[test]
    fn empty_backend_name_is_precondition_violation() {
        let options = TopologyOptions::new("x.example.com");
        let routing = Routing::BackendOnly {
            backend: ServiceRef::new("", 8080),
        };
        let err = IngressCompiler::compile(&options, &routing).expect_err("should fail");
        assert!(matches!(err, Error::Precondition { .. }));
    }

    #[test]
    fn zero_port_is_precondition_violation() {
        let options = TopologyOptions::new("x.example.com");
        let routing = Routing::Split {
            backend: backend(),
            frontend: ServiceRef::new("plone-frontend", 0),
        };
        let err = IngressCompiler::compile(&options, &routing).expect_err("should fail");
        assert!(err.to_string().contains("port 0"));
    }

    #[test]
    fn serializes_networking_v1_shape() {
        let options = TopologyOptions::new("x.example.com");
        let output = IngressCompiler::compile(&options, &split()).expect("should compile");
        let json = serde_json::to_value(&output[0]).expect("ingress should serialize");

        assert_eq!(json["apiVersion"], "networking.k8s.io/v1");
        assert_eq!(json["kind"], "Ingress");
        let path = &json["spec"]["rules"][0]["http"]["paths"][0];
        assert_eq!(path["pathType"], "Prefix");
        assert_eq!(path["backend"]["service"]["name"], "plone-backend");
        assert_eq!(path["backend"]["service"]["port"]["number"], 8080);
    }
}

//! Varnish HTTP cache in front of the application
//!
//! Generates a ConfigMap with a VCL built from the application's published
//! services, plus a Varnish Deployment and Service. The cache only reads
//! the application compiler's output; it publishes nothing for ingress to
//! route to.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use trellis_common::kube_utils::ObjectMeta;
use trellis_common::{LABEL_COMPONENT, LABEL_NAME};

use crate::k8s::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, Deployment, EnvVar, PodSpec,
    Service, Volume, VolumeMount,
};
use crate::options::TopologyOptions;
use crate::workload::{http_probe, CompiledApplication, Routing, ServiceRef};

/// Varnish image
pub const VARNISH_IMAGE: &str = "varnish:7.6";

/// Port Varnish listens on
pub const VARNISH_PORT: u16 = 8080;

/// Replicas of the cache
const VARNISH_REPLICAS: u32 = 2;

/// Key of the VCL inside the ConfigMap
const VCL_KEY: &str = "default.vcl";

/// Where the official image reads its VCL from
const VCL_MOUNT_PATH: &str = "/etc/varnish";

/// Generated cache resources
#[derive(Clone, Debug)]
pub struct CompiledHttpCache {
    /// ConfigMap holding the VCL
    pub config_map: ConfigMap,
    /// Varnish Deployment
    pub deployment: Deployment,
    /// Varnish Service
    pub service: Service,
}

/// Compiler for the Varnish layer
pub struct HttpCacheCompiler;

impl HttpCacheCompiler {
    /// Compile the cache for an application topology.
    ///
    /// Only `chart_name` and `namespace` are read from `options`; every
    /// upstream is taken from `application.routing`.
    pub fn compile(
        options: &TopologyOptions,
        application: &CompiledApplication,
    ) -> CompiledHttpCache {
        let name = options.resource_name("httpcache");
        let namespace = options.namespace.as_deref();
        let vcl_name = format!("{}-vcl", name);

        let config_map = ConfigMap::new(
            ObjectMeta::new(&vcl_name, namespace).with_label(LABEL_COMPONENT, "httpcache"),
        )
        .with_data(VCL_KEY, render_vcl(&application.routing));

        let mut container = Container::new(
            "varnish",
            VARNISH_IMAGE,
            ContainerPort::tcp("http", VARNISH_PORT),
        );
        container.env = vec![EnvVar::literal("VARNISH_HTTP_PORT", VARNISH_PORT.to_string())];
        container.readiness_probe = Some(http_probe("/", VARNISH_PORT, 5));
        container.volume_mounts = vec![VolumeMount {
            name: "vcl".to_string(),
            mount_path: VCL_MOUNT_PATH.to_string(),
            read_only: Some(true),
        }];

        let selector = BTreeMap::from([
            (LABEL_NAME.to_string(), name.clone()),
            (LABEL_COMPONENT.to_string(), "httpcache".to_string()),
        ]);
        let metadata = ObjectMeta::new(&name, namespace).with_label(LABEL_COMPONENT, "httpcache");

        let deployment = Deployment::new(
            metadata.clone(),
            VARNISH_REPLICAS,
            selector.clone(),
            PodSpec {
                containers: vec![container],
                volumes: vec![Volume {
                    name: "vcl".to_string(),
                    config_map: ConfigMapVolumeSource { name: vcl_name },
                }],
            },
        );
        let service = Service::cluster_ip(metadata, selector, "http", VARNISH_PORT);

        CompiledHttpCache {
            config_map,
            deployment,
            service,
        }
    }
}

/// Render the VCL for a routing topology.
///
/// With a frontend, `/++api++` goes to the backend and everything else to
/// the frontend, matching the ingress split.
fn render_vcl(routing: &Routing) -> String {
    let mut vcl = String::from("vcl 4.1;\n\nimport std;\n\n");

    match routing {
        Routing::BackendOnly { backend } => {
            push_backend(&mut vcl, "plone_backend", backend);
            vcl.push_str("sub vcl_recv {\n");
            vcl.push_str("    set req.backend_hint = plone_backend;\n");
        }
        Routing::Split { backend, frontend } => {
            push_backend(&mut vcl, "plone_backend", backend);
            push_backend(&mut vcl, "plone_frontend", frontend);
            vcl.push_str("sub vcl_recv {\n");
            vcl.push_str("    if (req.url ~ \"^/\\+\\+api\\+\\+\") {\n");
            vcl.push_str("        set req.backend_hint = plone_backend;\n");
            vcl.push_str("    } else {\n");
            vcl.push_str("        set req.backend_hint = plone_frontend;\n");
            vcl.push_str("    }\n");
        }
    }

    vcl.push_str("    if (req.method == \"PURGE\") {\n");
    vcl.push_str("        return (purge);\n");
    vcl.push_str("    }\n");
    vcl.push_str("}\n");
    vcl
}

fn push_backend(vcl: &mut String, label: &str, service: &ServiceRef) {
    // Writing to a String cannot fail
    let _ = write!(
        vcl,
        "backend {} {{\n    .host = \"{}\";\n    .port = \"{}\";\n}}\n\n",
        label, service.name, service.port
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::ApplicationCompiler;

    fn options() -> TopologyOptions {
        TopologyOptions::new("x.example.com")
    }

    #[test]
    fn backend_only_vcl_sends_everything_to_backend() {
        let app = ApplicationCompiler::compile_backend_only(&options(), vec![]);
        let cache = HttpCacheCompiler::compile(&options(), &app);
        let vcl = cache.config_map.data.get(VCL_KEY).expect("vcl should be set");

        assert!(vcl.starts_with("vcl 4.1;"));
        assert!(vcl.contains(".host = \"plone-backend\";"));
        assert!(vcl.contains(".port = \"8080\";"));
        assert!(!vcl.contains("plone_frontend"));
    }

    #[test]
    fn split_vcl_routes_api_to_backend() {
        let app = ApplicationCompiler::compile_with_frontend(&options(), vec![]);
        let cache = HttpCacheCompiler::compile(&options(), &app);
        let vcl = cache.config_map.data.get(VCL_KEY).expect("vcl should be set");

        assert!(vcl.contains(".host = \"plone-frontend\";"));
        assert!(vcl.contains(".port = \"3000\";"));
        let api = vcl.find("\\+\\+api").expect("api match present");
        let fallback = vcl
            .find("req.backend_hint = plone_frontend")
            .expect("frontend fallback present");
        assert!(api < fallback);
    }

    #[test]
    fn deployment_mounts_vcl_config_map() {
        let app = ApplicationCompiler::compile_backend_only(&options(), vec![]);
        let cache = HttpCacheCompiler::compile(&options(), &app);

        let pod = &cache.deployment.spec.template.spec;
        assert_eq!(pod.volumes[0].config_map.name, cache.config_map.metadata.name);
        assert_eq!(pod.containers[0].volume_mounts[0].mount_path, "/etc/varnish");
        assert_eq!(pod.containers[0].image, VARNISH_IMAGE);
    }

    #[test]
    fn service_is_named_after_chart() {
        let app = ApplicationCompiler::compile_backend_only(&options(), vec![]);
        let cache = HttpCacheCompiler::compile(&options(), &app);
        assert_eq!(cache.service.metadata.name, "plone-httpcache");
        assert_eq!(cache.service.spec.ports[0].port, VARNISH_PORT);
        assert_eq!(cache.config_map.metadata.name, "plone-httpcache-vcl");
    }
}

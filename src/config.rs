//! Topology configuration from flags and environment
//!
//! Every option can be given as a flag or through its environment variable
//! (flag wins). Values are collected as raw strings and validated here, so
//! malformed input is reported as a configuration error before any
//! composition runs. Empty strings count as unset.
//!
//! | Flag                   | Env                  | Default                      |
//! |------------------------|----------------------|------------------------------|
//! | `--chart-name`         | `CHART_NAME`         | `plone`                      |
//! | `--namespace`          | `NAMESPACE`          | none                         |
//! | `--domain`             | `DOMAIN`             | required                     |
//! | `--domain-maintenance` | `DOMAIN_MAINTENANCE` | none                         |
//! | `--cert-issuer`        | `CERT_ISSUER`        | none                         |
//! | `--backend-replicas`   | `BACKEND_REPLICAS`   | `2`                          |
//! | `--frontend-replicas`  | `FRONTEND_REPLICAS`  | `2`                          |
//! | `--image`              | `IMAGE`              | `ghcr.io/plone/plone:latest` |
//! | `--image-tag`          | `IMAGE_TAG`          | `latest`                     |
//! | `--pg-instances`       | `PG_INSTANCES`       | `2`                          |
//! | `--pg-storage`         | `PG_STORAGE`         | `20Gi`                       |

use clap::Args;
use trellis_chart::options::{
    DEFAULT_CHART_NAME, DEFAULT_IMAGE, DEFAULT_IMAGE_TAG, DEFAULT_PG_INSTANCES,
    DEFAULT_PG_STORAGE, DEFAULT_REPLICAS,
};
use trellis_chart::{DatabaseOptions, Features, TopologyOptions};
use trellis_common::{Error, Result, MAX_LABEL_LENGTH};

/// Binary and decimal quantity suffixes accepted for storage sizes
const SIZE_SUFFIXES: &[&str] = &[
    "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "k", "M", "G", "T", "P", "E",
];

/// Longest suffix appended to the chart name by [`TopologyOptions::resource_name`]
const LONGEST_NAME_SUFFIX: &str = "-ingress-maintenance";

/// Raw topology options as given by the operator
#[derive(Args, Debug, Clone, Default)]
pub struct TopologyArgs {
    /// Chart identity; prefixes every resource name
    #[arg(long, env = "CHART_NAME")]
    pub chart_name: Option<String>,

    /// Namespace to stamp on every resource
    #[arg(long, env = "NAMESPACE")]
    pub namespace: Option<String>,

    /// Public host of the site
    #[arg(long, env = "DOMAIN")]
    pub domain: Option<String>,

    /// Host giving direct backend access, bypassing frontend and cache
    #[arg(long, env = "DOMAIN_MAINTENANCE")]
    pub domain_maintenance: Option<String>,

    /// cert-manager ClusterIssuer; enables TLS on every ingress
    #[arg(long, env = "CERT_ISSUER")]
    pub cert_issuer: Option<String>,

    /// Backend replicas (0 scales the backend to zero)
    #[arg(long, env = "BACKEND_REPLICAS")]
    pub backend_replicas: Option<String>,

    /// Frontend replicas
    #[arg(long, env = "FRONTEND_REPLICAS")]
    pub frontend_replicas: Option<String>,

    /// Container image for backend and frontend
    #[arg(long, env = "IMAGE")]
    pub image: Option<String>,

    /// Image tag, reported as the application version
    #[arg(long, env = "IMAGE_TAG")]
    pub image_tag: Option<String>,

    /// PostgreSQL instances (managed database only)
    #[arg(long, env = "PG_INSTANCES")]
    pub pg_instances: Option<String>,

    /// PostgreSQL volume size, e.g. 20Gi (managed database only)
    #[arg(long, env = "PG_STORAGE")]
    pub pg_storage: Option<String>,
}

/// Generation-time feature switches; everything is on unless disabled
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct FeatureArgs {
    /// Generate a backend-only (Classic UI) topology
    #[arg(long)]
    pub no_frontend: bool,

    /// Skip the Varnish HTTP cache
    #[arg(long)]
    pub no_cache: bool,

    /// Skip the CloudNativePG cluster; the backend gets a placeholder DSN
    #[arg(long)]
    pub no_database: bool,

    /// Skip Ingress resources
    #[arg(long)]
    pub no_ingress: bool,
}

impl FeatureArgs {
    /// Resolve switches into the feature set
    pub fn features(&self) -> Features {
        Features {
            frontend: !self.no_frontend,
            cache: !self.no_cache,
            managed_database: !self.no_database,
            ingress: !self.no_ingress,
        }
    }
}

impl TopologyArgs {
    /// Validate raw input into [`TopologyOptions`].
    ///
    /// Database sizing is only read when `features.managed_database` is set.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` naming the first offending option.
    pub fn resolve(&self, features: &Features) -> Result<TopologyOptions> {
        let domain = non_empty(&self.domain).ok_or_else(|| {
            Error::configuration("domain", "is required (set --domain or DOMAIN)")
        })?;

        let domain_maintenance = non_empty(&self.domain_maintenance);
        if let Some(ref maintenance) = domain_maintenance {
            if maintenance.eq_ignore_ascii_case(&domain) {
                return Err(Error::configuration(
                    "domain_maintenance",
                    format!("must differ from domain '{}'", domain),
                ));
            }
        }

        let chart_name = match non_empty(&self.chart_name) {
            Some(name) => {
                let max = MAX_LABEL_LENGTH - LONGEST_NAME_SUFFIX.len();
                check_dns_label("chart_name", &name, max)?;
                name
            }
            None => DEFAULT_CHART_NAME.to_string(),
        };

        let namespace = non_empty(&self.namespace);
        if let Some(ref ns) = namespace {
            check_dns_label("namespace", ns, MAX_LABEL_LENGTH)?;
        }

        let database = if features.managed_database {
            DatabaseOptions {
                instances: parse_instances(&self.pg_instances)?,
                storage_size: parse_storage_size(&self.pg_storage)?,
            }
        } else {
            DatabaseOptions::default()
        };

        Ok(TopologyOptions {
            chart_name,
            namespace,
            domain,
            domain_maintenance,
            cert_issuer: non_empty(&self.cert_issuer),
            backend_replicas: parse_replicas("backend_replicas", &self.backend_replicas)?,
            frontend_replicas: parse_replicas("frontend_replicas", &self.frontend_replicas)?,
            image: non_empty(&self.image).unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            image_tag: non_empty(&self.image_tag)
                .unwrap_or_else(|| DEFAULT_IMAGE_TAG.to_string()),
            database,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Lowercase alphanumerics and `-`, starting and ending alphanumeric
fn check_dns_label(field: &str, value: &str, max_len: usize) -> Result<()> {
    if value.len() > max_len {
        return Err(Error::configuration(
            field,
            format!("'{}' is longer than {} characters", value, max_len),
        ));
    }
    let valid_chars = value
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !valid_chars || value.starts_with('-') || value.ends_with('-') {
        return Err(Error::configuration(
            field,
            format!(
                "'{}' must consist of lowercase alphanumerics or '-', \
                 starting and ending with an alphanumeric",
                value
            ),
        ));
    }
    Ok(())
}

fn parse_replicas(field: &str, value: &Option<String>) -> Result<u32> {
    match non_empty(value) {
        None => Ok(DEFAULT_REPLICAS),
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            Error::configuration(field, format!("'{}' is not a non-negative integer", raw))
        }),
    }
}

fn parse_instances(value: &Option<String>) -> Result<u32> {
    let instances = match non_empty(value) {
        None => DEFAULT_PG_INSTANCES,
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            Error::configuration("pg_instances", format!("'{}' is not an integer", raw))
        })?,
    };
    if instances == 0 {
        return Err(Error::configuration("pg_instances", "must be at least 1"));
    }
    Ok(instances)
}

fn parse_storage_size(value: &Option<String>) -> Result<String> {
    let Some(raw) = non_empty(value) else {
        return Ok(DEFAULT_PG_STORAGE.to_string());
    };
    if is_size_quantity(&raw) {
        Ok(raw)
    } else {
        Err(Error::configuration(
            "pg_storage",
            format!("'{}' is not a size like 20Gi or 500M", raw),
        ))
    }
}

/// Number (optionally with a fraction) followed by a quantity suffix
fn is_size_quantity(raw: &str) -> bool {
    let Some(number) = SIZE_SUFFIXES
        .iter()
        .find_map(|suffix| raw.strip_suffix(suffix))
    else {
        return false;
    };

    let mut parts = number.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(whole) && fraction.map_or(true, all_digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(domain: &str) -> TopologyArgs {
        TopologyArgs {
            domain: Some(domain.to_string()),
            ..Default::default()
        }
    }

    fn field_of(err: Error) -> String {
        match err {
            Error::Configuration { field, .. } => field,
            other => panic!("expected configuration error, got {other}"),
        }
    }

    #[test]
    fn resolves_defaults() {
        let options = args("x.example.com")
            .resolve(&Features::default())
            .expect("should resolve");
        assert_eq!(options, TopologyOptions::new("x.example.com"));
    }

    #[test]
    fn missing_domain_is_configuration_error() {
        let err = TopologyArgs::default()
            .resolve(&Features::default())
            .expect_err("should fail");
        assert_eq!(field_of(err), "domain");
    }

    #[test]
    fn blank_domain_counts_as_missing() {
        let err = args("  ")
            .resolve(&Features::default())
            .expect_err("should fail");
        assert_eq!(field_of(err), "domain");
    }

    #[test]
    fn maintenance_domain_must_differ() {
        let mut raw = args("x.example.com");
        raw.domain_maintenance = Some("X.example.com".to_string());
        let err = raw.resolve(&Features::default()).expect_err("should fail");
        assert_eq!(field_of(err), "domain_maintenance");
    }

    #[test]
    fn empty_optional_values_are_unset() {
        let mut raw = args("x.example.com");
        raw.cert_issuer = Some(String::new());
        raw.domain_maintenance = Some(String::new());
        let options = raw.resolve(&Features::default()).expect("should resolve");
        assert!(options.cert_issuer.is_none());
        assert!(options.domain_maintenance.is_none());
    }

    #[test]
    fn chart_name_must_be_dns_label() {
        for bad in ["My Site", "my_site", "-site", "site-", "Plone"] {
            let mut raw = args("x.example.com");
            raw.chart_name = Some(bad.to_string());
            let err = raw.resolve(&Features::default()).expect_err(bad);
            assert_eq!(field_of(err), "chart_name");
        }
    }

    #[test]
    fn chart_name_leaves_room_for_longest_suffix() {
        let fits = "a".repeat(MAX_LABEL_LENGTH - LONGEST_NAME_SUFFIX.len());
        let mut raw = args("x.example.com");
        raw.chart_name = Some(fits.clone());
        let options = raw.resolve(&Features::default()).expect("should resolve");
        assert_eq!(options.resource_name("ingress-maintenance").len(), MAX_LABEL_LENGTH);

        raw.chart_name = Some(format!("{fits}a"));
        let err = raw.resolve(&Features::default()).expect_err("should fail");
        assert_eq!(field_of(err), "chart_name");
    }

    #[test]
    fn valid_chart_name_and_namespace_are_kept() {
        let mut raw = args("x.example.com");
        raw.chart_name = Some("my-site2".to_string());
        raw.namespace = Some("web".to_string());
        let options = raw.resolve(&Features::default()).expect("should resolve");
        assert_eq!(options.chart_name, "my-site2");
        assert_eq!(options.namespace.as_deref(), Some("web"));
    }

    #[test]
    fn namespace_must_be_dns_label() {
        let mut raw = args("x.example.com");
        raw.namespace = Some("Prod.Site".to_string());
        let err = raw.resolve(&Features::default()).expect_err("should fail");
        assert_eq!(field_of(err), "namespace");
    }

    #[test]
    fn zero_replicas_are_allowed() {
        let mut raw = args("x.example.com");
        raw.backend_replicas = Some("0".to_string());
        let options = raw.resolve(&Features::default()).expect("should resolve");
        assert_eq!(options.backend_replicas, 0);
    }

    #[test]
    fn negative_replicas_are_rejected() {
        let mut raw = args("x.example.com");
        raw.frontend_replicas = Some("-1".to_string());
        let err = raw.resolve(&Features::default()).expect_err("should fail");
        assert_eq!(field_of(err), "frontend_replicas");
    }

    #[test]
    fn zero_pg_instances_are_rejected() {
        let mut raw = args("x.example.com");
        raw.pg_instances = Some("0".to_string());
        let err = raw.resolve(&Features::default()).expect_err("should fail");
        assert_eq!(field_of(err), "pg_instances");
    }

    #[test]
    fn malformed_storage_is_rejected() {
        for bad in ["20", "Gi", "twentyGi", "1.Gi", "20GB"] {
            let mut raw = args("x.example.com");
            raw.pg_storage = Some(bad.to_string());
            let err = raw.resolve(&Features::default()).expect_err(bad);
            assert_eq!(field_of(err), "pg_storage");
        }
    }

    #[test]
    fn accepts_size_quantities() {
        for good in ["20Gi", "1Ti", "500M", "1.5Gi", "100k"] {
            assert!(is_size_quantity(good), "{good} should be accepted");
        }
    }

    #[test]
    fn database_values_ignored_without_managed_database() {
        let mut raw = args("x.example.com");
        raw.pg_instances = Some("0".to_string());
        raw.pg_storage = Some("bogus".to_string());
        let features = Features {
            managed_database: false,
            ..Features::default()
        };
        let options = raw.resolve(&features).expect("should resolve");
        assert_eq!(options.database, DatabaseOptions::default());
    }

    #[test]
    fn feature_switches_disable_features() {
        let switches = FeatureArgs {
            no_frontend: true,
            no_ingress: true,
            ..Default::default()
        };
        let features = switches.features();
        assert!(!features.frontend);
        assert!(features.cache);
        assert!(features.managed_database);
        assert!(!features.ingress);
    }
}

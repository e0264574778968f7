//! Multi-document YAML emission
//!
//! Renders a sequence of serializable resources into a single YAML stream,
//! one document per resource, in the order given. Parsing is provided for
//! consumers that want to inspect a rendered stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Document separator placed before every rendered resource
const DOCUMENT_SEPARATOR: &str = "---\n";

/// Render resources into a multi-document YAML stream.
///
/// Every document is preceded by `---`. An empty input renders as an empty
/// string. Map keys inside resources keep their declared order, so the same
/// input always renders byte-identical output.
pub fn to_documents<'a, T, I>(resources: I) -> Result<String>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut out = String::new();
    for resource in resources {
        let doc = serde_yaml::to_string(resource)?;
        out.push_str(DOCUMENT_SEPARATOR);
        out.push_str(&doc);
    }
    Ok(out)
}

/// Parse a multi-document YAML stream into a Vec of serde_json::Values.
///
/// Each YAML document separated by `---` becomes a separate Value. Empty
/// documents are skipped.
pub fn parse_documents(input: &str) -> Result<Vec<Value>> {
    let mut docs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(input) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            docs.push(value);
        }
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Doc {
        api_version: String,
        kind: String,
        name: String,
    }

    fn doc(kind: &str, name: &str) -> Doc {
        Doc {
            api_version: "v1".to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn renders_one_document_per_resource() {
        let docs = vec![doc("Service", "a"), doc("Service", "b")];
        let yaml = to_documents(&docs).expect("should render");
        assert_eq!(yaml.matches("---\n").count(), 2);
        assert!(yaml.starts_with("---\napiVersion: v1\n"));
    }

    #[test]
    fn preserves_input_order() {
        let docs = vec![doc("Service", "zeta"), doc("Service", "alpha")];
        let yaml = to_documents(&docs).expect("should render");
        let zeta = yaml.find("zeta").expect("zeta rendered");
        let alpha = yaml.find("alpha").expect("alpha rendered");
        assert!(zeta < alpha);
    }

    #[test]
    fn empty_input_renders_empty_stream() {
        let docs: Vec<Doc> = vec![];
        let yaml = to_documents(&docs).expect("should render");
        assert!(yaml.is_empty());
    }

    #[test]
    fn parses_rendered_stream_back() {
        let docs = vec![doc("ConfigMap", "one"), doc("Secret", "two")];
        let yaml = to_documents(&docs).expect("should render");
        let parsed = parse_documents(&yaml).expect("should parse");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["kind"], "ConfigMap");
        assert_eq!(parsed[1]["name"], "two");
    }

    #[test]
    fn parse_rejects_invalid_yaml() {
        assert!(parse_documents("not: valid: yaml: {{").is_err());
    }
}

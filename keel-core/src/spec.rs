//! Release description documents — the `values.yaml` analog.
//!
//! ```yaml
//! name: webapp
//! components:
//!   - name: backend
//!     image: registry.local/api:1.0
//!     replicas: 2
//!     ports: [8080]
//!     env:
//!       DATABASE_URL: postgres://database:5432/app
//!   - name: frontend
//!     image: registry.local/web:1.0
//!     exposure: loadbalanced
//! ```
//!
//! Unrecognized fields are ignored. The document is decoded loosely first so
//! that a missing `image` or a negative replica count is reported as an
//! invalid spec instead of a YAML type error.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::SpecError;
use crate::types::{ComponentName, ComponentSpec, Exposure, ReleaseName, ReleaseSpec};

const DEFAULT_REPLICAS: i64 = 1;

#[derive(Debug, Deserialize)]
struct ReleaseDocument {
    name: Option<String>,
    #[serde(default)]
    components: Vec<ComponentDocument>,
}

#[derive(Debug, Deserialize)]
struct ComponentDocument {
    name: Option<String>,
    image: Option<String>,
    replicas: Option<i64>,
    #[serde(default)]
    ports: Vec<i64>,
    #[serde(default)]
    env: BTreeMap<String, EnvValue>,
    exposure: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnvValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl EnvValue {
    fn into_string(self) -> String {
        match self {
            EnvValue::Text(s) => s,
            EnvValue::Int(n) => n.to_string(),
            EnvValue::Float(n) => n.to_string(),
            EnvValue::Bool(b) => b.to_string(),
        }
    }
}

/// Parse and validate a release description held in memory.
pub fn parse_str(contents: &str) -> Result<ReleaseSpec, SpecError> {
    let doc: ReleaseDocument = serde_yaml::from_str(contents)?;
    into_spec(doc)
}

/// Read, parse and validate a release description file.
pub fn load_file(path: &Path) -> Result<ReleaseSpec, SpecError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: ReleaseDocument =
        serde_yaml::from_str(&contents).map_err(|source| SpecError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    into_spec(doc)
}

fn into_spec(doc: ReleaseDocument) -> Result<ReleaseSpec, SpecError> {
    let name = doc
        .name
        .ok_or_else(|| SpecError::invalid("missing required field 'name'"))?;

    let components = doc
        .components
        .into_iter()
        .enumerate()
        .map(|(index, c)| into_component(index, c))
        .collect::<Result<Vec<_>, _>>()?;

    let spec = ReleaseSpec {
        name: ReleaseName::from(name),
        components,
    };
    spec.validate()?;
    Ok(spec)
}

fn into_component(index: usize, doc: ComponentDocument) -> Result<ComponentSpec, SpecError> {
    let name = doc.name.ok_or_else(|| {
        SpecError::invalid(format!("components[{index}]: missing required field 'name'"))
    })?;
    let image = doc.image.ok_or_else(|| {
        SpecError::invalid(format!("component '{name}': missing required field 'image'"))
    })?;

    let replicas = doc.replicas.unwrap_or(DEFAULT_REPLICAS);
    let replicas = u32::try_from(replicas).map_err(|_| {
        if replicas < 0 {
            SpecError::invalid(format!(
                "component '{name}': replica count must not be negative (got {replicas})"
            ))
        } else {
            SpecError::invalid(format!(
                "component '{name}': replica count {replicas} is too large"
            ))
        }
    })?;

    let ports = doc
        .ports
        .into_iter()
        .map(|p| match u16::try_from(p) {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(SpecError::invalid(format!(
                "component '{name}': port {p} is out of range 1-65535"
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let exposure = match doc.exposure {
        Some(raw) => raw.parse::<Exposure>().map_err(|e| match e {
            SpecError::InvalidSpec { reason } => {
                SpecError::invalid(format!("component '{name}': {reason}"))
            }
            other => other,
        })?,
        None => Exposure::default(),
    };

    Ok(ComponentSpec {
        name: ComponentName::from(name),
        image,
        replicas,
        ports,
        env: doc
            .env
            .into_iter()
            .map(|(k, v)| (k, v.into_string()))
            .collect(),
        exposure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBAPP: &str = r#"
name: webapp
chart: ignored
components:
  - name: backend
    image: registry.local/api:1.0
    replicas: 2
    ports: [8080]
    env:
      DATABASE_URL: postgres://database:5432/app
      WORKERS: 4
      DEBUG: false
  - name: frontend
    image: registry.local/web:1.0
    exposure: LoadBalancer
    ports: [80, 443]
"#;

    #[test]
    fn parses_full_document() {
        let spec = parse_str(WEBAPP).expect("parse");
        assert_eq!(spec.name, ReleaseName::from("webapp"));
        assert_eq!(spec.components.len(), 2);

        let backend = &spec.components[0];
        assert_eq!(backend.replicas, 2);
        assert_eq!(backend.ports, vec![8080]);
        assert_eq!(backend.env["WORKERS"], "4");
        assert_eq!(backend.env["DEBUG"], "false");
        assert_eq!(backend.exposure, Exposure::Internal);

        let frontend = &spec.components[1];
        assert_eq!(frontend.replicas, 1, "replicas default to 1");
        assert_eq!(frontend.exposure, Exposure::LoadBalanced);
    }

    #[test]
    fn declaration_order_is_preserved() {
        let spec = parse_str(WEBAPP).expect("parse");
        let names: Vec<_> = spec.components.iter().map(|c| c.name.0.as_str()).collect();
        assert_eq!(names, ["backend", "frontend"]);
    }

    #[test]
    fn json_documents_are_accepted() {
        let spec = parse_str(r#"{"name":"api","components":[{"name":"web","image":"web:1"}]}"#)
            .expect("parse");
        assert_eq!(spec.components[0].image, "web:1");
    }

    #[test]
    fn syntax_error_is_yaml_error() {
        let err = parse_str("name: [unclosed").unwrap_err();
        assert!(matches!(err, SpecError::Yaml(_)), "got: {err}");
    }

    #[test]
    fn load_file_reports_path_on_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("values.yaml");
        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, SpecError::Io { .. }));
        assert!(err.to_string().contains("values.yaml"));
    }
}

//! Logging configuration: the table mapping logging block names to ids.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::id::NodeId;
use crate::tree::{FileKind, NodeKind, SoyTree};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggableElement {
    pub name: String,
    pub id: i64,
    /// Fully qualified type of the metadata a block of this name may attach.
    #[serde(default)]
    pub proto_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default)]
    pub elements: Vec<LoggableElement>,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn add_element(mut self, name: &str, id: i64, proto_type: Option<&str>) -> Self {
        self.elements.push(LoggableElement {
            name: name.to_string(),
            id,
            proto_type: proto_type.map(str::to_string),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoggingConfigError {
    #[error("logging element name '{name}' is configured more than once")]
    DuplicateName { name: String },
    #[error("logging id {id} is used by both '{first}' and '{second}'")]
    DuplicateId {
        id: i64,
        first: String,
        second: String,
    },
    #[error("{{velog {name}}} at {file}:{line} does not match any configured logging element")]
    UnknownElement { name: String, file: String, line: u32 },
    #[error("{{velog {name}}} already has logging id {existing}, refusing to reassign {new}")]
    IdAlreadyAssigned { name: String, existing: i64, new: i64 },
}

/// A logging configuration with unique names and ids.
#[derive(Debug, Clone, Default)]
pub struct ValidatedLoggingConfig {
    by_name: HashMap<String, LoggableElement>,
}

impl ValidatedLoggingConfig {
    pub fn create(config: LoggingConfig) -> Result<Self, LoggingConfigError> {
        let mut by_name: HashMap<String, LoggableElement> = HashMap::new();
        let mut by_id: HashMap<i64, String> = HashMap::new();
        for element in config.elements {
            if by_name.contains_key(&element.name) {
                return Err(LoggingConfigError::DuplicateName { name: element.name });
            }
            if let Some(first) = by_id.get(&element.id) {
                return Err(LoggingConfigError::DuplicateId {
                    id: element.id,
                    first: first.clone(),
                    second: element.name,
                });
            }
            by_id.insert(element.id, element.name.clone());
            by_name.insert(element.name.clone(), element);
        }
        Ok(Self { by_name })
    }

    pub fn element(&self, name: &str) -> Option<&LoggableElement> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Annotates every `{velog}` block in the unit's source files with its logging
/// id. Either every block is resolved or the tree is left untouched. Returns the
/// number of blocks resolved.
pub fn assign_logging_ids(
    tree: &mut SoyTree,
    config: &ValidatedLoggingConfig,
) -> Result<usize, LoggingConfigError> {
    let mut assignments: Vec<(NodeId, i64)> = Vec::new();

    for file in tree.children(tree.root()) {
        if let NodeKind::File {
            file_kind: FileKind::Dep,
            ..
        } = tree.kind(*file)
        {
            continue;
        }
        for node in tree.descendants(*file) {
            let NodeKind::VeLog(data) = tree.kind(node) else {
                continue;
            };
            let location = &tree[node].location;
            let element =
                config
                    .element(&data.name)
                    .ok_or_else(|| LoggingConfigError::UnknownElement {
                        name: data.name.clone(),
                        file: location.file_path.clone(),
                        line: location.begin.line,
                    })?;
            match data.logging_id {
                Some(existing) if existing != element.id => {
                    return Err(LoggingConfigError::IdAlreadyAssigned {
                        name: data.name.clone(),
                        existing,
                        new: element.id,
                    });
                }
                _ => assignments.push((node, element.id)),
            }
        }
    }

    for (node, id) in &assignments {
        if let Some(NodeKind::VeLog(data)) = tree.kind_mut(*node) {
            debug!(name = %data.name, logging_id = id, "resolved logging id");
            data.logging_id = Some(*id);
        }
    }
    Ok(assignments.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{SourceLocation, VeLogNode};

    fn tree_with_velog(name: &str, logging_id: Option<i64>) -> (SoyTree, NodeId) {
        let mut tree = SoyTree::new();
        let root = tree.root();
        let file = tree.append(
            root,
            NodeKind::File {
                path: "a.soy".to_string(),
                file_kind: FileKind::Src,
            },
            SourceLocation::unknown(),
        );
        let velog = tree.append(
            file,
            NodeKind::VeLog(VeLogNode {
                name: name.to_string(),
                logging_id,
                config: None,
                logonly: None,
            }),
            SourceLocation::unknown(),
        );
        (tree, velog)
    }

    fn config() -> ValidatedLoggingConfig {
        ValidatedLoggingConfig::create(
            LoggingConfig::new().add_element("Bar", 1, Some("soy.test.Foo")),
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_names_and_ids_are_rejected() {
        let dup_name = LoggingConfig::new()
            .add_element("Bar", 1, None)
            .add_element("Bar", 2, None);
        assert_eq!(
            ValidatedLoggingConfig::create(dup_name).unwrap_err(),
            LoggingConfigError::DuplicateName {
                name: "Bar".to_string()
            }
        );

        let dup_id = LoggingConfig::new()
            .add_element("Bar", 1, None)
            .add_element("Baz", 1, None);
        assert!(matches!(
            ValidatedLoggingConfig::create(dup_id),
            Err(LoggingConfigError::DuplicateId { id: 1, .. })
        ));
    }

    #[test]
    fn test_assigns_ids() {
        let (mut tree, velog) = tree_with_velog("Bar", None);
        assert_eq!(assign_logging_ids(&mut tree, &config()), Ok(1));
        let NodeKind::VeLog(data) = tree.kind(velog) else {
            panic!("expected velog");
        };
        assert_eq!(data.logging_id, Some(1));
        assert_eq!(
            config().element("Bar").unwrap().proto_type.as_deref(),
            Some("soy.test.Foo")
        );
    }

    #[test]
    fn test_unknown_element() {
        let (mut tree, _) = tree_with_velog("Nope", None);
        assert!(matches!(
            assign_logging_ids(&mut tree, &config()),
            Err(LoggingConfigError::UnknownElement { .. })
        ));
    }

    #[test]
    fn test_assigned_id_is_immutable() {
        let (mut tree, _) = tree_with_velog("Bar", Some(9));
        assert_eq!(
            assign_logging_ids(&mut tree, &config()),
            Err(LoggingConfigError::IdAlreadyAssigned {
                name: "Bar".to_string(),
                existing: 9,
                new: 1
            })
        );

        let (mut same, _) = tree_with_velog("Bar", Some(1));
        assert_eq!(assign_logging_ids(&mut same, &config()), Ok(1));
    }

    #[test]
    fn test_config_from_json() {
        let config = LoggingConfig::from_json(
            r#"{"elements":[{"name":"Bar","id":1,"protoType":"soy.test.Foo"}]}"#,
        )
        .unwrap();
        assert_eq!(config.elements[0].proto_type.as_deref(), Some("soy.test.Foo"));
    }
}

//! The minimal RO-Crate JSON-LD graph model this crate owns: a `@graph`
//! array of entities, each addressable by `@id`, with an index built once at
//! parse time.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Error, Result};

/// A single entity from an RO-Crate graph: a JSON object carrying at least
/// an `@id`.
#[derive(Debug, Clone)]
pub struct RoCrateEntity(Value);

impl RoCrateEntity {
    /// The entity's `@id`, as stored in the graph (not path-normalised).
    pub fn id(&self) -> &str {
        self.0.get("@id").and_then(Value::as_str).unwrap_or_default()
    }

    /// Look up an arbitrary field on the entity.
    ///
    /// Per the override rule in the explorer's enrichment pass, callers that
    /// read `name`/`description` through this method must check
    /// [`Value::as_str`] themselves; non-string values are treated as absent,
    /// never coerced.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The entity's underlying JSON object, for fields this crate doesn't
    /// model explicitly.
    pub fn raw(&self) -> &Value {
        &self.0
    }
}

/// A read-only view over a parsed RO-Crate graph.
///
/// Constructed once by [`super::RoCrateMetadataProvider::load_metadata`] and
/// never mutated afterwards; the underlying [`serde_json::Value`] is never
/// exposed through a `&mut` accessor.
#[derive(Debug, Clone)]
pub struct RoCrate {
    document: Value,
    /// `@id` (path-normalised: a leading `./` stripped) → index into `@graph`.
    index: IndexMap<String, usize>,
}

impl RoCrate {
    /// Parse a full RO-Crate JSON document (the `{"@context": ..., "@graph": [...]}` shape).
    pub(super) fn from_document(document: Value) -> Result<Self> {
        let graph = document
            .get("@graph")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::malformed("ro-crate-metadata.json has no top-level @graph array"))?;

        let mut index = IndexMap::with_capacity(graph.len());
        for (position, entity) in graph.iter().enumerate() {
            let Some(id) = entity.get("@id").and_then(Value::as_str) else {
                continue;
            };
            index.insert(normalise_id(id), position);
        }

        Ok(Self { document, index })
    }

    /// Number of entities in the graph.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Look up a graph entity by an archive entry path.
    ///
    /// Matches the RO-Crate convention of identifying file entities by their
    /// path relative to the crate root; a leading `./` on the stored `@id` is
    /// stripped before indexing, so both forms resolve to the same entity.
    pub fn get_entity(&self, path: &str) -> Option<RoCrateEntity> {
        let position = *self.index.get(normalise_id(path).as_str())?;
        self.entity_at(position)
    }

    /// The crate's own `@id` — conventionally `ro-crate-metadata.json`.
    pub fn id(&self) -> Option<&str> {
        self.entity_at(*self.index.get("ro-crate-metadata.json")?)
            .map(|_| "ro-crate-metadata.json")
    }

    /// The root data entity: conventionally the entity whose `@id` is `"./"`,
    /// falling back to following the metadata descriptor's `about.@id`
    /// reference when no entity is directly keyed by `"./"`.
    pub fn root_entity(&self) -> Option<RoCrateEntity> {
        if let Some(entity) = self.get_entity("./") {
            return Some(entity);
        }

        let descriptor = self.get_entity("ro-crate-metadata.json")?;
        let about_id = descriptor.get("about")?.get("@id")?.as_str()?;
        self.get_entity(about_id)
    }

    /// The underlying parsed document, for fields this crate doesn't model.
    pub fn raw(&self) -> &Value {
        &self.document
    }

    fn entity_at(&self, position: usize) -> Option<RoCrateEntity> {
        self.document.get("@graph")?.get(position).cloned().map(RoCrateEntity)
    }
}

/// Strip a leading `./` so `"./data/a.txt"` and `"data/a.txt"` index alike.
fn normalise_id(id: &str) -> String {
    id.strip_prefix("./").unwrap_or(id).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Value {
        serde_json::json!({
            "@graph": [
                { "@id": "ro-crate-metadata.json", "about": { "@id": "./" } },
                { "@id": "./", "name": "Root" },
                { "@id": "./nested/file.txt", "name": "Nested" }
            ]
        })
    }

    #[test]
    fn resolves_entity_with_and_without_leading_dot_slash() {
        let crate_ = RoCrate::from_document(doc()).unwrap();
        assert_eq!(
            crate_.get_entity("nested/file.txt").unwrap().get("name").unwrap(),
            "Nested"
        );
    }

    #[test]
    fn root_entity_falls_back_to_descriptor_about() {
        let crate_ = RoCrate::from_document(doc()).unwrap();
        let root = crate_.root_entity().unwrap();
        assert_eq!(root.get("name").unwrap(), "Root");
    }

    #[test]
    fn missing_graph_is_malformed() {
        let err = RoCrate::from_document(serde_json::json!({})).unwrap_err();
        assert!(matches!(err, Error::MalformedArchive { .. }));
    }

    #[test]
    fn unknown_path_returns_none() {
        let crate_ = RoCrate::from_document(doc()).unwrap();
        assert!(crate_.get_entity("does/not/exist.txt").is_none());
    }
}

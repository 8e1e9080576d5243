//! Document pruning: keep a requested subset of operations and the schemas
//! they transitively reach.
//!
//! The degenerate empty criteria keeps nothing: filtering is opt-in per
//! item, not "no criteria means everything".

use std::collections::{BTreeMap, BTreeSet};

use oas3::{Spec, spec::Operation};

use crate::compiler::graph::{SchemaGraph, collect_operation_refs};

/// Selection criteria; composable, all unioned together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
  pub tags: BTreeSet<String>,
  pub paths: BTreeSet<String>,
  pub operation_ids: BTreeSet<String>,
  /// Component schemas to retain even if no kept operation references them.
  pub schemas: BTreeSet<String>,
}

impl FilterCriteria {
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.tags.is_empty() && self.paths.is_empty() && self.operation_ids.is_empty() && self.schemas.is_empty()
  }

  fn matches(&self, path: &str, operation: &Operation) -> bool {
    if self.paths.contains(path) {
      return true;
    }
    if let Some(id) = &operation.operation_id
      && self.operation_ids.contains(id)
    {
      return true;
    }
    operation.tags.iter().any(|tag| self.tags.contains(tag))
  }
}

/// Produces a pruned copy of `spec`.
///
/// The result's operations are exactly those matching the criteria; its
/// component schemas are the transitive `$ref` closure of the kept
/// operations plus any explicitly requested schemas.
#[must_use]
pub fn filter(spec: &Spec, criteria: &FilterCriteria) -> Spec {
  let mut filtered = spec.clone();
  let graph = SchemaGraph::build(spec);

  let mut seeds: BTreeSet<String> = criteria
    .schemas
    .iter()
    .filter(|key| graph.schemas().contains_key(*key))
    .cloned()
    .collect();

  filtered.paths = spec.paths.as_ref().map(|paths| {
    let mut kept_paths = BTreeMap::new();
    for (path, item) in paths {
      let mut kept_item = item.clone();
      let kept_methods: Vec<_> = item
        .methods()
        .into_iter()
        .filter(|(_, operation)| criteria.matches(path, operation))
        .collect();

      if kept_methods.is_empty() {
        continue;
      }

      for (_, operation) in &kept_methods {
        seeds.extend(collect_operation_refs(operation, spec));
      }

      for param_ref in &item.parameters {
        if let Ok(param) = param_ref.resolve(spec)
          && let Some(schema_ref) = &param.schema
          && let Some(key) = crate::compiler::graph::schema_ref_key_of(schema_ref)
        {
          seeds.insert(key);
        }
      }

      let kept: BTreeSet<&str> = kept_methods.iter().map(|(m, _)| m.as_str()).collect();
      prune_methods(&mut kept_item, &kept);
      kept_paths.insert(path.clone(), kept_item);
    }
    kept_paths
  });

  let retained = graph.transitive_closure(&seeds);

  if let Some(components) = &mut filtered.components {
    components.schemas.retain(|key, _| retained.contains(key));
  }

  filtered
}

fn prune_methods(item: &mut oas3::spec::PathItem, kept: &BTreeSet<&str>) {
  if !kept.contains("GET") {
    item.get = None;
  }
  if !kept.contains("PUT") {
    item.put = None;
  }
  if !kept.contains("POST") {
    item.post = None;
  }
  if !kept.contains("DELETE") {
    item.delete = None;
  }
  if !kept.contains("OPTIONS") {
    item.options = None;
  }
  if !kept.contains("HEAD") {
    item.head = None;
  }
  if !kept.contains("PATCH") {
    item.patch = None;
  }
  if !kept.contains("TRACE") {
    item.trace = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_spec() -> Spec {
    oas3::from_json(
      r##"{
        "openapi": "3.0.0",
        "info": { "title": "t", "version": "1" },
        "paths": {
          "/pets": {
            "get": {
              "operationId": "listPets",
              "tags": ["pets"],
              "responses": {
                "200": {
                  "description": "ok",
                  "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } } }
                }
              }
            },
            "post": {
              "operationId": "createPet",
              "tags": ["admin"],
              "responses": {
                "201": {
                  "description": "created",
                  "content": { "application/json": { "schema": { "$ref": "#/components/schemas/AuditRecord" } } }
                }
              }
            }
          },
          "/health": {
            "get": {
              "operationId": "health",
              "responses": { "200": { "description": "ok" } }
            }
          }
        },
        "components": { "schemas": {
          "Pet": { "type": "object", "properties": { "tag": { "$ref": "#/components/schemas/Tag" } } },
          "Tag": { "type": "string" },
          "AuditRecord": { "type": "object" },
          "Orphan": { "type": "string" }
        } }
      }"##,
    )
    .unwrap()
  }

  fn schema_keys(spec: &Spec) -> BTreeSet<String> {
    spec
      .components
      .as_ref()
      .map(|c| c.schemas.keys().cloned().collect())
      .unwrap_or_default()
  }

  #[test]
  fn empty_criteria_keeps_nothing() {
    let filtered = filter(&sample_spec(), &FilterCriteria::default());

    assert!(filtered.paths.as_ref().is_some_and(BTreeMap::is_empty));
    assert!(schema_keys(&filtered).is_empty());
  }

  #[test]
  fn operation_id_keeps_transitive_schemas() {
    let criteria = FilterCriteria {
      operation_ids: BTreeSet::from(["listPets".to_string()]),
      ..FilterCriteria::default()
    };
    let filtered = filter(&sample_spec(), &criteria);

    assert_eq!(schema_keys(&filtered), BTreeSet::from(["Pet".into(), "Tag".into()]));

    let paths = filtered.paths.unwrap();
    let pets = paths.get("/pets").unwrap();
    assert!(pets.get.is_some());
    assert!(pets.post.is_none(), "createPet was not requested");
    assert!(!paths.contains_key("/health"));
  }

  #[test]
  fn schema_referenced_by_kept_and_dropped_operations_is_kept() {
    let criteria = FilterCriteria {
      tags: BTreeSet::from(["pets".to_string()]),
      ..FilterCriteria::default()
    };
    let filtered = filter(&sample_spec(), &criteria);
    let keys = schema_keys(&filtered);

    assert!(keys.contains("Pet"));
    assert!(!keys.contains("AuditRecord"), "only reachable from dropped createPet");
    assert!(!keys.contains("Orphan"));
  }

  #[test]
  fn explicit_schema_request_is_retained_with_dependencies() {
    let criteria = FilterCriteria {
      schemas: BTreeSet::from(["Pet".to_string()]),
      ..FilterCriteria::default()
    };
    let filtered = filter(&sample_spec(), &criteria);

    assert_eq!(schema_keys(&filtered), BTreeSet::from(["Pet".into(), "Tag".into()]));
    assert!(filtered.paths.as_ref().is_some_and(BTreeMap::is_empty));
  }

  #[test]
  fn path_criteria_keep_all_methods_on_that_path() {
    let criteria = FilterCriteria {
      paths: BTreeSet::from(["/pets".to_string()]),
      ..FilterCriteria::default()
    };
    let filtered = filter(&sample_spec(), &criteria);
    let paths = filtered.paths.unwrap();
    let pets = paths.get("/pets").unwrap();

    assert!(pets.get.is_some());
    assert!(pets.post.is_some());
  }
}

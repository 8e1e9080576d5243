//! Schema reference graph: dependency edges, cycle detection, reachability.

use std::collections::{BTreeMap, BTreeSet};

use oas3::{
  Spec,
  spec::{ObjectOrReference, ObjectSchema, Operation, Schema},
};
use petgraph::{algo::kosaraju_scc, graphmap::DiGraphMap, visit::Dfs};

pub(crate) const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Extracts the component key from a `#/components/schemas/...` ref path.
pub(crate) fn schema_ref_key(ref_path: &str) -> Option<String> {
  ref_path.strip_prefix(SCHEMA_REF_PREFIX).map(str::to_string)
}

pub(crate) fn schema_ref_key_of(obj_ref: &ObjectOrReference<ObjectSchema>) -> Option<String> {
  match obj_ref {
    ObjectOrReference::Ref { ref_path, .. } => schema_ref_key(ref_path),
    ObjectOrReference::Object(_) => None,
  }
}

/// Component-schema reference graph for one document.
#[derive(Debug)]
pub(crate) struct SchemaGraph {
  schemas: BTreeMap<String, ObjectSchema>,
  dependencies: BTreeMap<String, BTreeSet<String>>,
  cyclic: BTreeSet<String>,
  unresolved: Vec<String>,
}

impl SchemaGraph {
  pub(crate) fn build(spec: &Spec) -> Self {
    let mut schemas = BTreeMap::new();
    let mut unresolved = Vec::new();

    if let Some(components) = &spec.components {
      for (name, schema_ref) in &components.schemas {
        match schema_ref.resolve(spec) {
          Ok(schema) => {
            schemas.insert(name.clone(), schema);
          }
          Err(_) => unresolved.push(name.clone()),
        }
      }
    }

    let dependencies = schemas
      .iter()
      .map(|(name, schema)| (name.clone(), collect_schema_refs(schema)))
      .collect();

    Self {
      schemas,
      dependencies,
      cyclic: BTreeSet::new(),
      unresolved,
    }
  }

  pub(crate) fn schemas(&self) -> &BTreeMap<String, ObjectSchema> {
    &self.schemas
  }

  /// Component keys whose top-level reference could not be resolved.
  pub(crate) fn unresolved(&self) -> &[String] {
    &self.unresolved
  }

  /// Strongly connected components of size > 1, plus self-loops.
  pub(crate) fn detect_cycles(&mut self) -> Vec<Vec<String>> {
    let mut graph = DiGraphMap::<&str, ()>::new();
    for (node, deps) in &self.dependencies {
      graph.add_node(node.as_str());
      for dep in deps {
        graph.add_edge(node.as_str(), dep.as_str(), ());
      }
    }

    let cycles: Vec<Vec<String>> = kosaraju_scc(&graph)
      .into_iter()
      .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
      .map(|scc| scc.into_iter().map(String::from).collect())
      .collect();

    self.cyclic.extend(cycles.iter().flatten().cloned());
    cycles
  }

  pub(crate) fn is_cyclic(&self, schema_key: &str) -> bool {
    self.cyclic.contains(schema_key)
  }

  /// Expands a seed set to everything reachable through `$ref` edges.
  pub(crate) fn transitive_closure(&self, seeds: &BTreeSet<String>) -> BTreeSet<String> {
    let graph = DiGraphMap::<&str, ()>::from_edges(
      self
        .dependencies
        .iter()
        .flat_map(|(node, deps)| deps.iter().map(move |dep| (node.as_str(), dep.as_str()))),
    );

    let mut closure = seeds.clone();
    for seed in seeds {
      if graph.contains_node(seed.as_str()) {
        let mut dfs = Dfs::new(&graph, seed.as_str());
        while let Some(node) = dfs.next(&graph) {
          closure.insert(node.to_string());
        }
      }
    }
    closure
  }
}

/// Collects every component-schema key referenced from `schema`, descending
/// into inline subschemas.
pub(crate) fn collect_schema_refs(schema: &ObjectSchema) -> BTreeSet<String> {
  let mut refs = BTreeSet::new();
  collect_into(schema, &mut refs);
  refs
}

fn collect_into(schema: &ObjectSchema, refs: &mut BTreeSet<String>) {
  let mut visit = |schema_ref: &ObjectOrReference<ObjectSchema>, refs: &mut BTreeSet<String>| {
    if let Some(key) = schema_ref_key_of(schema_ref) {
      refs.insert(key);
    }
    if let ObjectOrReference::Object(inline) = schema_ref {
      collect_into(inline, refs);
    }
  };

  for prop in schema.properties.values() {
    visit(prop, refs);
  }

  for branch in schema.one_of.iter().chain(&schema.any_of).chain(&schema.all_of) {
    visit(branch, refs);
  }

  if let Some(items) = &schema.items
    && let Schema::Object(items_ref) = &**items
  {
    visit(items_ref, refs);
  }

  if let Some(Schema::Object(value_ref)) = &schema.additional_properties {
    visit(value_ref, refs);
  }
}

/// Collects every component-schema key reachable from one operation:
/// parameters, request body content, and response content.
pub(crate) fn collect_operation_refs(operation: &Operation, spec: &Spec) -> BTreeSet<String> {
  let mut refs = BTreeSet::new();

  for param_ref in &operation.parameters {
    if let Ok(param) = param_ref.resolve(spec)
      && let Some(schema_ref) = &param.schema
    {
      collect_ref(schema_ref, &mut refs);
    }
  }

  if let Some(body_ref) = &operation.request_body
    && let Ok(body) = body_ref.resolve(spec)
  {
    for media in body.content.values() {
      if let Some(schema_ref) = &media.schema {
        collect_ref(schema_ref, &mut refs);
      }
    }
  }

  if let Some(responses) = &operation.responses {
    for response_ref in responses.values() {
      if let Ok(response) = response_ref.resolve(spec) {
        for media in response.content.values() {
          if let Some(schema_ref) = &media.schema {
            collect_ref(schema_ref, &mut refs);
          }
        }
      }
    }
  }

  refs
}

fn collect_ref(schema_ref: &ObjectOrReference<ObjectSchema>, refs: &mut BTreeSet<String>) {
  if let Some(key) = schema_ref_key_of(schema_ref) {
    refs.insert(key);
  }
  if let ObjectOrReference::Object(inline) = schema_ref {
    refs.extend(collect_schema_refs(inline));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn spec_with_schemas(schemas_json: &str) -> Spec {
    let doc = format!(
      r##"{{
        "openapi": "3.0.0",
        "info": {{ "title": "t", "version": "1" }},
        "paths": {{}},
        "components": {{ "schemas": {schemas_json} }}
      }}"##
    );
    oas3::from_json(doc).unwrap()
  }

  #[test]
  fn detects_mutual_reference_cycle() {
    let spec = spec_with_schemas(
      r##"{
        "A": { "type": "object", "properties": { "b": { "$ref": "#/components/schemas/B" } } },
        "B": { "type": "object", "properties": { "a": { "$ref": "#/components/schemas/A" } } }
      }"##,
    );
    let mut graph = SchemaGraph::build(&spec);
    let cycles = graph.detect_cycles();

    assert_eq!(cycles.len(), 1);
    assert!(graph.is_cyclic("A"));
    assert!(graph.is_cyclic("B"));
  }

  #[test]
  fn detects_self_loop() {
    let spec = spec_with_schemas(
      r##"{ "Node": { "type": "object", "properties": { "next": { "$ref": "#/components/schemas/Node" } } } }"##,
    );
    let mut graph = SchemaGraph::build(&spec);
    assert_eq!(graph.detect_cycles(), vec![vec!["Node".to_string()]]);
  }

  #[test]
  fn acyclic_graph_reports_no_cycles() {
    let spec = spec_with_schemas(
      r##"{
        "Leaf": { "type": "string" },
        "Tree": { "type": "object", "properties": { "leaf": { "$ref": "#/components/schemas/Leaf" } } }
      }"##,
    );
    let mut graph = SchemaGraph::build(&spec);
    assert!(graph.detect_cycles().is_empty());
  }

  #[test]
  fn closure_follows_nested_refs() {
    let spec = spec_with_schemas(
      r##"{
        "A": { "type": "object", "properties": { "b": { "$ref": "#/components/schemas/B" } } },
        "B": { "type": "array", "items": { "$ref": "#/components/schemas/C" } },
        "C": { "type": "string" },
        "Unrelated": { "type": "integer" }
      }"##,
    );
    let graph = SchemaGraph::build(&spec);
    let closure = graph.transitive_closure(&BTreeSet::from(["A".to_string()]));

    assert_eq!(closure, BTreeSet::from(["A".into(), "B".into(), "C".into()]));
  }
}

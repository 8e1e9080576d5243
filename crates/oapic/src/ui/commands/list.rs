use std::path::PathBuf;

use anyhow::Context;
use oapic::compiler::{DocumentFormat, parse};

/// Fallback id for operations the document leaves anonymous, mirroring the
/// stable ids the generator derives.
fn generate_operation_id(method: &str, path: &str) -> String {
  let path_parts: Vec<&str> = path
    .split('/')
    .filter(|s| !s.is_empty())
    .map(|s| {
      if s.starts_with('{') && s.ends_with('}') {
        "by_id"
      } else {
        s
      }
    })
    .collect();

  let method_lower = method.to_lowercase();
  if path_parts.is_empty() {
    method_lower
  } else {
    format!("{}_{}", method_lower, path_parts.join("_"))
  }
}

pub async fn list_operations(input: &PathBuf) -> anyhow::Result<()> {
  let bytes = tokio::fs::read(input)
    .await
    .with_context(|| format!("failed to read {}", input.display()))?;
  let document = parse(&bytes, DocumentFormat::from_path(input))?;

  let mut operations = Vec::new();
  for (path, method, operation) in document.spec.operations() {
    let id = operation
      .operation_id
      .clone()
      .unwrap_or_else(|| generate_operation_id(method.as_str(), &path));
    operations.push((id, method.as_str().to_string(), path));
  }

  operations.sort_by(|a, b| a.0.cmp(&b.0));

  let id_width = operations
    .iter()
    .map(|(id, _, _)| id.len())
    .chain(std::iter::once("OPERATION ID".len()))
    .max()
    .unwrap_or(0);

  println!("{:<id_width$}  {:>7}  PATH", "OPERATION ID", "METHOD");
  for (operation_id, method, path) in operations {
    println!("{operation_id:<id_width$}  {method:>7}  {path}");
  }

  Ok(())
}

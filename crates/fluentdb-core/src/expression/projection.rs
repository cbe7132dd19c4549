//! Projection expressions.

use std::collections::HashSet;

use super::compiled::{CompiledExpression, ExpressionSerializer};
use crate::error::ClientResult;

/// Compile a projection with a fresh generator under `prefix`.
///
/// A path requested more than once is projected once, at its first position.
pub fn compile_projection<S: AsRef<str>>(
    paths: &[S],
    prefix: &str,
) -> ClientResult<CompiledExpression> {
    let mut serializer = ExpressionSerializer::new(prefix);
    let mut seen = HashSet::new();
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        if seen.insert(path) {
            parts.push(serializer.attribute_path(path)?);
        }
    }
    Ok(serializer.finish(parts.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_deduplicate_paths() {
        let expr = compile_projection(&["id", "info.name", "id"], "proj_").unwrap();
        assert_eq!(expr.text, "#proj_a, #proj_b.#proj_c");
        assert_eq!(expr.names.len(), 3);
        assert!(expr.values.is_empty());
    }

    #[test]
    fn test_should_produce_empty_projection() {
        let expr = compile_projection::<&str>(&[], "proj_").unwrap();
        assert!(expr.is_empty());
    }
}

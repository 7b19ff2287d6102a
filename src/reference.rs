//! Cross-reference resolution against the global declaration registry.
//!
//! A property flagged `element_ref` does not own a fixed type: it points at
//! whichever root declarations are assignable to its declared base type. The
//! candidates are found by a linear scan of the registry in registration
//! order, so the result is stable from call to call.

use crate::descriptor::TypeDescriptor;
use crate::error::{Error, Result, SourceLocation};
use crate::model::{GlobalDeclaration, GlobalRegistry, TypeModel};
use log::debug;
use std::collections::HashSet;

/// Resolve the candidate declarations for a reference to `base`
pub fn resolve_reference(
    model: &TypeModel,
    base: &TypeDescriptor,
    registry: &GlobalRegistry,
    location: &SourceLocation,
) -> Result<Vec<GlobalDeclaration>> {
    if let Some(def) = model.type_def(base.raw()) {
        if def.implicit_global {
            debug!("{} is implicitly global, using its own declaration", def.name);
            return Ok(vec![GlobalDeclaration {
                qname: def.qname(),
                type_name: def.name.clone(),
                root: false,
            }]);
        }
    }

    let candidates = candidates(model, base.raw(), registry);
    if candidates.is_empty() {
        return Err(Error::CrossReferenceUnresolved {
            base_type: base.raw().to_string(),
            location: location.clone(),
        });
    }

    debug!(
        "Reference to {} resolved to {} candidates",
        base.raw(),
        candidates.len()
    );
    Ok(candidates)
}

/// Root declarations assignable to `base_type`, in registration order
pub fn candidates(model: &TypeModel, base_type: &str, registry: &GlobalRegistry) -> Vec<GlobalDeclaration> {
    let mut seen = HashSet::new();
    registry
        .iter()
        .filter(|declaration| declaration.root)
        .filter(|declaration| model.is_assignable(&declaration.type_name, base_type))
        .filter(|declaration| seen.insert(declaration.qname.clone()))
        .cloned()
        .collect()
}

//! The reference frame: every addressable location in a schema document,
//! indexed before compilation begins.
//!
//! Framing is what lets `$ref` compile without chasing anything at
//! evaluation time, and it is where the two template-wide properties are
//! detected: whether the schema uses dynamic referencing (which forces the
//! run-time resource stack to be live) and whether it consumes annotations
//! (which forces exhaustive evaluation).

use std::collections::HashMap;

use jsonschema_vm_pointer::Pointer;
use serde_json::Value;

use super::dialect::Dialect;
use crate::context::anchor_label;
use crate::error::CompileError;

/// A location a reference can resolve to.
#[derive(Debug, Clone)]
pub struct FrameLocation {
    /// Path from the document root.
    pub pointer: Pointer,
    /// The resource the location lives in.
    pub resource: String,
}

/// A `$dynamicAnchor` (or `$recursiveAnchor`) site.
#[derive(Debug, Clone)]
pub struct DynamicAnchor {
    pub resource: String,
    pub anchor: String,
    pub pointer: Pointer,
}

/// A resolved reference: where it points and which resource that is.
#[derive(Debug, Clone)]
pub struct ResolvedRef {
    pub pointer: Pointer,
    pub resource: String,
}

/// The label identifier of a statically addressed location. Pointer
/// renderings always start with `/` (or are empty, for the root), which no
/// anchor name may contain, so these never collide with anchor labels.
pub fn static_label(pointer: &Pointer) -> u64 {
    anchor_label("", &pointer.to_string())
}

#[derive(Debug, Default)]
pub struct Frame {
    locations: HashMap<String, FrameLocation>,
    pub dynamic_anchors: Vec<DynamicAnchor>,
    pub root_resource: String,
    pub uses_dynamic: bool,
    pub uses_unevaluated: bool,
}

/// Keywords whose values are data, not schemas. Walking into them would
/// register identifiers that are content, not structure.
const NON_SCHEMA_KEYWORDS: &[&str] = &["const", "enum", "default", "examples", "required"];

impl Frame {
    pub fn build(schema: &Value, dialect: Dialect) -> Frame {
        let mut frame = Frame::default();

        frame.root_resource = schema
            .get(dialect.id_keyword())
            .and_then(Value::as_str)
            .filter(|id| !id.starts_with('#'))
            .unwrap_or("")
            .to_string();
        frame.locations.insert(
            String::new(),
            FrameLocation {
                pointer: Pointer::new(),
                resource: frame.root_resource.clone(),
            },
        );
        if !frame.root_resource.is_empty() {
            frame.locations.insert(
                frame.root_resource.clone(),
                FrameLocation {
                    pointer: Pointer::new(),
                    resource: frame.root_resource.clone(),
                },
            );
        }

        let root_resource = frame.root_resource.clone();
        frame.walk(schema, dialect, Pointer::new(), &root_resource);
        frame
    }

    fn walk(&mut self, value: &Value, dialect: Dialect, pointer: Pointer, resource: &str) {
        match value {
            Value::Object(object) => {
                let mut resource = resource.to_string();

                if let Some(id) = object.get(dialect.id_keyword()).and_then(Value::as_str) {
                    if let Some(anchor) = id.strip_prefix('#') {
                        // Up to Draft 7, a fragment-only identifier is a
                        // plain anchor in the enclosing resource.
                        self.locations.insert(
                            format!("{resource}#{anchor}"),
                            FrameLocation {
                                pointer: pointer.clone(),
                                resource: resource.clone(),
                            },
                        );
                    } else if !pointer.is_empty() {
                        resource = id.to_string();
                        self.locations.insert(
                            resource.clone(),
                            FrameLocation {
                                pointer: pointer.clone(),
                                resource: resource.clone(),
                            },
                        );
                    }
                }

                if let Some(anchor) = object.get("$anchor").and_then(Value::as_str) {
                    self.locations.insert(
                        format!("{resource}#{anchor}"),
                        FrameLocation {
                            pointer: pointer.clone(),
                            resource: resource.clone(),
                        },
                    );
                }

                if let Some(anchor) = object.get("$dynamicAnchor").and_then(Value::as_str) {
                    // A dynamic anchor is also addressable statically.
                    self.locations.insert(
                        format!("{resource}#{anchor}"),
                        FrameLocation {
                            pointer: pointer.clone(),
                            resource: resource.clone(),
                        },
                    );
                    self.dynamic_anchors.push(DynamicAnchor {
                        resource: resource.clone(),
                        anchor: anchor.to_string(),
                        pointer: pointer.clone(),
                    });
                }

                if object.get("$recursiveAnchor").and_then(Value::as_bool) == Some(true) {
                    self.dynamic_anchors.push(DynamicAnchor {
                        resource: resource.clone(),
                        anchor: String::new(),
                        pointer: pointer.clone(),
                    });
                }

                if object.contains_key("$recursiveRef") || object.contains_key("$dynamicRef") {
                    self.uses_dynamic = true;
                }
                if object.contains_key("unevaluatedProperties")
                    || object.contains_key("unevaluatedItems")
                {
                    self.uses_unevaluated = true;
                }

                for (key, child) in object {
                    if NON_SCHEMA_KEYWORDS.contains(&key.as_str()) {
                        continue;
                    }
                    self.walk(child, dialect, pointer.join(key.as_str()), &resource);
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    self.walk(child, dialect, pointer.join(index), resource);
                }
            }
            _ => {}
        }
    }

    /// Resolves a reference string against the current resource.
    ///
    /// Supported shapes: `#` (resource root), `#/a/b` (pointer into the
    /// resource), `#name` (anchor), `uri` (another resource by exact
    /// identifier), and `uri#fragment` combinations of the above. There is
    /// no relative-URI arithmetic; identifiers match exactly.
    pub fn resolve(
        &self,
        reference: &str,
        current_resource: &str,
    ) -> Result<ResolvedRef, CompileError> {
        let (base, fragment) = match reference.split_once('#') {
            Some((base, fragment)) => (base, fragment),
            None => (reference, ""),
        };
        let resource = if base.is_empty() { current_resource } else { base };

        let location = self.locations.get(resource).ok_or_else(|| {
            CompileError::UnresolvableReference(reference.to_string())
        })?;

        if fragment.is_empty() {
            return Ok(ResolvedRef {
                pointer: location.pointer.clone(),
                resource: location.resource.clone(),
            });
        }

        if fragment.starts_with('/') {
            let suffix = Pointer::parse(fragment)?;
            return Ok(ResolvedRef {
                pointer: location.pointer.concat(&suffix),
                resource: location.resource.clone(),
            });
        }

        let anchor = self
            .locations
            .get(&format!("{resource}#{fragment}"))
            .ok_or_else(|| CompileError::UnresolvableReference(reference.to_string()))?;
        Ok(ResolvedRef {
            pointer: anchor.pointer.clone(),
            resource: anchor.resource.clone(),
        })
    }

    /// Whether `(resource, anchor)` is a dynamic anchor site.
    pub fn is_dynamic_anchor(&self, resource: &str, anchor: &str) -> bool {
        self.dynamic_anchors
            .iter()
            .any(|candidate| candidate.resource == resource && candidate.anchor == anchor)
    }
}

/// The fragment name of a reference, for dynamic lookups.
pub fn reference_fragment(reference: &str) -> &str {
    match reference.split_once('#') {
        Some((_, fragment)) => fragment,
        None => "",
    }
}

use std::collections::HashSet;

use log::warn;

use crate::core::document::{Document, Validation};
use crate::core::error::{PdfError, ValidationError};
use crate::core::value::{NodeId, Object};

/// Validate catalog and page-tree structure.
/// Returns all findings (not just the first). Wrong `/Count` entries on
/// page-tree nodes are not findings: they are repaired in place and
/// reported as warnings.
pub fn validate_document(doc: &mut Document) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut repairs = Vec::new();

    let Some(root_value) = doc.trailer.get(b"Root") else {
        errors.push(ValidationError::new("Root", "trailer has no Root entry"));
        return errors;
    };
    let Some(root_id) = root_value.as_link() else {
        errors.push(ValidationError::new(
            "Root",
            "Root does not resolve to an object",
        ));
        return errors;
    };

    let Some(catalog) = doc.node(root_id).as_dict() else {
        errors.push(ValidationError::new("Root", "catalog is not a dictionary"));
        return errors;
    };
    if catalog.get(b"Type").and_then(Object::as_name) != Some(b"Catalog") {
        errors.push(ValidationError::new("Root/Type", "catalog Type is not /Catalog"));
    }

    match catalog.get(b"Pages") {
        None => {
            errors.push(ValidationError::new("Root/Pages", "catalog has no Pages entry"));
        }
        Some(pages_value) => {
            let pages_id = pages_value.as_link();
            let pages = doc.resolve(pages_value);
            if let Some(pages_dict) = pages.as_dict() {
                if pages_dict.contains_key(b"Parent") {
                    errors.push(ValidationError::new(
                        "Root/Pages",
                        "root page-tree node must not have a Parent",
                    ));
                }
            }
            let mut seen = HashSet::new();
            check_pages_node(
                doc,
                pages_id,
                pages,
                "Root/Pages",
                &mut seen,
                &mut errors,
                &mut repairs,
            );
        }
    }

    for (id, count) in repairs {
        if let Some(dict) = doc.node_mut(id).as_dict_mut() {
            dict.insert("Count", count);
        }
    }

    errors
}

/// Recursive page-tree check. Returns the number of leaf `/Page`
/// descendants of `value`.
fn check_pages_node(
    doc: &Document,
    id: Option<NodeId>,
    value: &Object,
    path: &str,
    seen: &mut HashSet<NodeId>,
    errors: &mut Vec<ValidationError>,
    repairs: &mut Vec<(NodeId, i64)>,
) -> i64 {
    if let Some(id) = id {
        if !seen.insert(id) {
            errors.push(ValidationError::new(path, "page tree contains a Kids cycle"));
            return 0;
        }
    }

    let Some(dict) = value.as_dict() else {
        errors.push(ValidationError::new(path, "page-tree node is not a dictionary"));
        return 0;
    };

    match dict.get(b"Type").and_then(Object::as_name) {
        Some(b"Page") => 1,
        Some(b"Pages") => {
            let mut count = 0;
            match dict.get(b"Kids").map(|k| doc.resolve(k)) {
                Some(Object::Array(kids)) => {
                    for (i, kid) in kids.iter().enumerate() {
                        let kid_path = format!("{path}/Kids/{i}");
                        count += check_pages_node(
                            doc,
                            kid.as_link(),
                            doc.resolve(kid),
                            &kid_path,
                            seen,
                            errors,
                            repairs,
                        );
                    }
                }
                Some(_) => {
                    errors.push(ValidationError::new(
                        format!("{path}/Kids"),
                        "Kids is not an array",
                    ));
                }
                None => {
                    errors.push(ValidationError::new(path, "page-tree node has no Kids"));
                }
            }
            let declared = dict.get(b"Count").and_then(Object::as_int);
            if declared != Some(count) {
                if let Some(id) = id {
                    warn!(
                        "{path}: repaired /Count {} -> {count}",
                        declared.map_or_else(|| "(missing)".into(), |c| c.to_string())
                    );
                    repairs.push((id, count));
                } else {
                    errors.push(ValidationError::new(
                        format!("{path}/Count"),
                        format!("Count is {declared:?}, expected {count}"),
                    ));
                }
            }
            count
        }
        other => {
            errors.push(ValidationError::new(
                path,
                format!(
                    "page-tree node Type is {:?}, expected /Pages or /Page",
                    other.map(String::from_utf8_lossy)
                ),
            ));
            0
        }
    }
}

/// Run validation under the given policy.
pub(crate) fn validate_with_policy(doc: &mut Document, policy: Validation) -> Result<(), PdfError> {
    if policy == Validation::Skip {
        return Ok(());
    }
    let errors = validate_document(doc);
    if errors.is_empty() {
        return Ok(());
    }
    if policy == Validation::Strict {
        return Err(PdfError::Validation(errors));
    }
    for e in &errors {
        warn!("validation: {e}");
    }
    Ok(())
}

use std::collections::BTreeMap;

use lopdf::{Bookmark, Document, Object, ObjectId};

use crate::error::PipelineError;
use crate::renderer::{Payload, RenderedArtifact};

/// A merged artifact, or the explicit marker that there was nothing to
/// merge (mirrors the zero-page slicing case).
#[derive(Debug, Clone, PartialEq)]
pub enum Combined {
    Empty,
    Text(String),
    Binary(Vec<u8>),
}

impl Combined {
    /// Payload bytes, or `None` for the empty marker.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Combined::Empty => None,
            Combined::Text(text) => Some(text.into_bytes()),
            Combined::Binary(bytes) => Some(bytes),
        }
    }
}

/// The page-boundary marker inserted between text pages.
///
/// Carries the label of the page it introduces; splitting combined text on
/// these markers reproduces the individual page bodies byte for byte.
pub fn page_boundary_marker(label: &str) -> String {
    format!("\n<!-- ===== {} ===== -->\n", label)
}

/// Sort artifacts into canonical ascending page order and validate the
/// index sequence.
///
/// Render order may have been arbitrary; combine order is always
/// canonical. The sequence must cover `1..=total` exactly once, where
/// pages listed in `missing` are allowed (recorded render failures) and
/// anything else absent, duplicated or out of range is a `CombineError`.
fn canonical_order<'a>(
    artifacts: &'a [RenderedArtifact],
    missing: &[usize],
) -> Result<Vec<&'a RenderedArtifact>, PipelineError> {
    let mut ordered: Vec<&RenderedArtifact> = artifacts.iter().collect();
    ordered.sort_by_key(|a| a.page_index);

    for pair in ordered.windows(2) {
        if pair[0].page_index == pair[1].page_index {
            return Err(PipelineError::Combine(format!(
                "Duplicate page index {}",
                pair[0].page_index
            )));
        }
    }

    let total = ordered.len() + missing.len();
    let mut next = ordered.iter();
    for expected in 1..=total {
        if missing.contains(&expected) {
            continue;
        }
        match next.next() {
            Some(artifact) if artifact.page_index == expected => {}
            Some(artifact) => {
                return Err(PipelineError::Combine(format!(
                    "Gap in page-index sequence: expected page {}, found page {}",
                    expected, artifact.page_index
                )));
            }
            None => {
                return Err(PipelineError::Combine(format!(
                    "Gap in page-index sequence: page {} is absent",
                    expected
                )));
            }
        }
    }
    if let Some(extra) = next.next() {
        return Err(PipelineError::Combine(format!(
            "Page index {} is out of range for {} pages",
            extra.page_index, total
        )));
    }

    Ok(ordered)
}

/// Merge text artifacts into one document with labeled page-boundary
/// markers between pages.
pub fn combine_text(
    artifacts: &[RenderedArtifact],
    missing: &[usize],
) -> Result<Combined, PipelineError> {
    let ordered = canonical_order(artifacts, missing)?;
    if ordered.is_empty() {
        return Ok(Combined::Empty);
    }

    log::info!("Combining {} text artifacts", ordered.len());
    let mut combined = String::new();
    for (i, artifact) in ordered.iter().enumerate() {
        let Payload::Text(body) = &artifact.payload else {
            return Err(PipelineError::Combine(format!(
                "Page {} artifact is not text",
                artifact.page_index
            )));
        };
        if i > 0 {
            combined.push_str(&page_boundary_marker(&artifact.label));
        }
        combined.push_str(body);
    }
    Ok(Combined::Text(combined))
}

/// Merge per-page PDF artifacts into one document.
///
/// Page boundaries stay addressable: each source artifact contributes a
/// bookmark titled with its page label pointing at its first physical
/// page.
pub fn combine_pdf(
    artifacts: &[RenderedArtifact],
    missing: &[usize],
) -> Result<Combined, PipelineError> {
    let ordered = canonical_order(artifacts, missing)?;
    if ordered.is_empty() {
        return Ok(Combined::Empty);
    }

    log::info!("Combining {} PDF artifacts", ordered.len());
    let combine_err = |reason: String| PipelineError::Combine(reason);

    let mut document = Document::with_version("1.5");
    let mut max_id = 1;
    let mut all_pages: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut all_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for artifact in &ordered {
        let Payload::Binary(bytes) = &artifact.payload else {
            return Err(combine_err(format!(
                "Page {} artifact is not binary",
                artifact.page_index
            )));
        };
        let mut doc = Document::load_mem(bytes).map_err(|e| {
            combine_err(format!(
                "Failed to load page {} PDF: {}",
                artifact.page_index, e
            ))
        })?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let mut first = true;
        for (_, object_id) in doc.get_pages() {
            if first {
                document.add_bookmark(
                    Bookmark::new(artifact.label.clone(), [0.0, 0.0, 0.0], 0, object_id),
                    None,
                );
                first = false;
            }
            if let Ok(object) = doc.get_object(object_id) {
                all_pages.insert(object_id, object.to_owned());
            }
        }
        all_objects.append(&mut doc.objects);
    }

    // One Catalog and one Pages tree survive the merge; everything else
    // is carried over as-is
    let mut catalog_object: Option<(ObjectId, Object)> = None;
    let mut pages_object: Option<(ObjectId, Object)> = None;
    for (object_id, object) in all_objects.iter() {
        match dict_type(object) {
            b"Catalog" => {
                if catalog_object.is_none() {
                    catalog_object = Some((*object_id, object.clone()));
                }
            }
            b"Pages" => {
                if let Ok(dictionary) = object.as_dict() {
                    let mut dictionary = dictionary.clone();
                    if let Some((_, ref existing)) = pages_object {
                        if let Ok(existing) = existing.as_dict() {
                            dictionary.extend(existing);
                        }
                    }
                    let id = pages_object.as_ref().map(|(id, _)| *id).unwrap_or(*object_id);
                    pages_object = Some((id, Object::Dictionary(dictionary)));
                }
            }
            b"Page" | b"Outlines" | b"Outline" => {}
            _ => {
                document.objects.insert(*object_id, object.clone());
            }
        }
    }

    let (pages_id, pages_root) =
        pages_object.ok_or_else(|| combine_err("No Pages root found".to_string()))?;
    let (catalog_id, catalog_root) =
        catalog_object.ok_or_else(|| combine_err("No Catalog found".to_string()))?;

    for (object_id, object) in all_pages.iter() {
        if let Ok(dictionary) = object.as_dict() {
            let mut dictionary = dictionary.clone();
            dictionary.set("Parent", pages_id);
            document
                .objects
                .insert(*object_id, Object::Dictionary(dictionary));
        }
    }

    if let Ok(dictionary) = pages_root.as_dict() {
        let mut dictionary = dictionary.clone();
        dictionary.set("Count", all_pages.len() as i64);
        dictionary.set(
            "Kids",
            all_pages
                .keys()
                .map(|id| Object::Reference(*id))
                .collect::<Vec<Object>>(),
        );
        document
            .objects
            .insert(pages_id, Object::Dictionary(dictionary));
    }

    if let Ok(dictionary) = catalog_root.as_dict() {
        let mut dictionary = dictionary.clone();
        dictionary.set("Pages", pages_id);
        dictionary.remove(b"Outlines");
        document
            .objects
            .insert(catalog_id, Object::Dictionary(dictionary));
    }
    document.trailer.set("Root", catalog_id);

    document.max_id = document.objects.len() as u32;
    document.renumber_objects();
    document.adjust_zero_pages();
    if let Some(outline_id) = document.build_outline() {
        if let Ok(Object::Dictionary(dict)) = document.get_object_mut(catalog_id) {
            dict.set("Outlines", Object::Reference(outline_id));
        }
    }
    document.compress();

    let mut bytes = Vec::new();
    document
        .save_to(&mut bytes)
        .map_err(|e| combine_err(format!("Failed to serialize combined PDF: {}", e)))?;
    Ok(Combined::Binary(bytes))
}

fn dict_type(object: &Object) -> &[u8] {
    object
        .as_dict()
        .ok()
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(|name| name.as_name().ok())
        .unwrap_or(b"")
}

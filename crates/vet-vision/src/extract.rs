//! Flattening Vision responses into warehouse annotation records.

use vet_models::{warehouse_timestamp, AnnotationRecord, VideoId};

use crate::client::{AnnotateImageResponse, Vertex};

/// Flatten one annotated thumbnail into warehouse rows.
///
/// Face boxes arrive in absolute pixels and are normalized against the
/// image dimensions; object boxes arrive pre-normalized; scene labels have
/// no spatial extent at all and keep the no-extent coordinate marker.
pub fn extract_annotations(
    video_id: &VideoId,
    thumbnail_url: &str,
    response: &AnnotateImageResponse,
    image_width: u32,
    image_height: u32,
) -> Vec<AnnotationRecord> {
    let mut records = Vec::new();
    let w = image_width as f64;
    let h = image_height as f64;
    let now = warehouse_timestamp();

    for face in &response.face_annotations {
        let Some((top_left, bottom_right)) = corner_pair(&face.bounding_poly.vertices) else {
            continue;
        };
        records.push(AnnotationRecord::spatial(
            video_id.as_str(),
            thumbnail_url,
            "Face",
            face.detection_confidence,
            top_left.x / w,
            top_left.y / h,
            bottom_right.x / w,
            bottom_right.y / h,
            now.clone(),
        ));
    }

    for object in &response.localized_object_annotations {
        let Some((top_left, bottom_right)) = corner_pair(&object.bounding_poly.normalized_vertices)
        else {
            continue;
        };
        records.push(AnnotationRecord::spatial(
            video_id.as_str(),
            thumbnail_url,
            &object.name,
            object.score,
            top_left.x,
            top_left.y,
            bottom_right.x,
            bottom_right.y,
            now.clone(),
        ));
    }

    for label in &response.label_annotations {
        records.push(AnnotationRecord::scene_label(
            video_id.as_str(),
            thumbnail_url,
            &label.description,
            label.score,
            now.clone(),
        ));
    }

    records
}

/// Top-left and bottom-right corners of a rectangular polygon. The API
/// lists vertices clockwise from the top left, so these are indices 0 and 2.
fn corner_pair(vertices: &[Vertex]) -> Option<(&Vertex, &Vertex)> {
    match (vertices.first(), vertices.get(2)) {
        (Some(tl), Some(br)) => Some((tl, br)),
        _ => None,
    }
}

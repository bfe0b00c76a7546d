//! Annotation records written to the `YouTubeThumbnailsWithAnnotations` table.

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// A bounding-box coordinate of an annotation.
///
/// Spatial annotations carry a numeric value (relative to the image after
/// normalization). Scene-level label annotations have no spatial extent;
/// those serialize as the string `"0"` (not null) to match the table schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coord {
    Value(f64),
    NoExtent,
}

impl Coord {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Coord::Value(v) => Some(*v),
            Coord::NoExtent => None,
        }
    }
}

impl From<f64> for Coord {
    fn from(v: f64) -> Self {
        Coord::Value(v)
    }
}

impl Serialize for Coord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Coord::Value(v) => serializer.serialize_f64(*v),
            Coord::NoExtent => serializer.serialize_str("0"),
        }
    }
}

impl<'de> Deserialize<'de> for Coord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CoordVisitor;

        impl<'de> Visitor<'de> for CoordVisitor {
            type Value = Coord;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a number or the string \"0\"")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Coord, E> {
                Ok(Coord::Value(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Coord, E> {
                Ok(Coord::Value(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Coord, E> {
                Ok(Coord::Value(v as f64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Coord, E> {
                if v == "0" {
                    Ok(Coord::NoExtent)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }
        }

        deserializer.deserialize_any(CoordVisitor)
    }
}

/// One detected face, object or scene label on a thumbnail.
///
/// Append-only; multiple records per thumbnail. Coordinates are relative
/// [0,1] for faces (converted at extraction) and objects, `"0"` for labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub video_id: String,
    pub thumbnail_url: String,
    pub label: String,
    pub confidence: f64,
    pub top_left_x: Coord,
    pub top_left_y: Coord,
    pub bottom_right_x: Coord,
    pub bottom_right_y: Coord,
    pub datetime_updated: String,
}

impl AnnotationRecord {
    /// Record for a detection with a bounding box.
    #[allow(clippy::too_many_arguments)]
    pub fn spatial(
        video_id: impl Into<String>,
        thumbnail_url: impl Into<String>,
        label: impl Into<String>,
        confidence: f64,
        top_left_x: f64,
        top_left_y: f64,
        bottom_right_x: f64,
        bottom_right_y: f64,
        datetime_updated: impl Into<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            thumbnail_url: thumbnail_url.into(),
            label: label.into(),
            confidence,
            top_left_x: Coord::Value(top_left_x),
            top_left_y: Coord::Value(top_left_y),
            bottom_right_x: Coord::Value(bottom_right_x),
            bottom_right_y: Coord::Value(bottom_right_y),
            datetime_updated: datetime_updated.into(),
        }
    }

    /// Record for a scene-level label with no spatial extent.
    pub fn scene_label(
        video_id: impl Into<String>,
        thumbnail_url: impl Into<String>,
        label: impl Into<String>,
        confidence: f64,
        datetime_updated: impl Into<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            thumbnail_url: thumbnail_url.into(),
            label: label.into(),
            confidence,
            top_left_x: Coord::NoExtent,
            top_left_y: Coord::NoExtent,
            bottom_right_x: Coord::NoExtent,
            bottom_right_y: Coord::NoExtent,
            datetime_updated: datetime_updated.into(),
        }
    }

    /// True when all four coordinates carry a numeric value.
    pub fn has_bounding_box(&self) -> bool {
        self.top_left_x.as_f64().is_some()
            && self.top_left_y.as_f64().is_some()
            && self.bottom_right_x.as_f64().is_some()
            && self.bottom_right_y.as_f64().is_some()
    }
}

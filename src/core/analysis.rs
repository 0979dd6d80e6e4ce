use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub type ImageId = String;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid analysis JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Analysis record {index} in {path} has no imageId")]
    MissingImageId { path: String, index: usize },

    #[error("No room analyses found in {path}")]
    Empty { path: String },
}

/// Structured description of one room photo, as returned by the vision step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_id: ImageId,
    pub room_type: String,
    pub flooring: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub windows: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lighting: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub features: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dimensions: RoomDimensions,
}

/// `null` deserializes to the field default, same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDimensions {
    #[serde(default)]
    pub size_class: Option<SizeClass>,
    /// Ceiling height in feet.
    #[serde(default)]
    pub ceiling_height: Option<f32>,
    #[serde(default)]
    pub square_footage: Option<SquareFootage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SizeClass {
    Small,
    Medium,
    Large,
    Other(String),
}

impl From<String> for SizeClass {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "small" => SizeClass::Small,
            "medium" => SizeClass::Medium,
            "large" => SizeClass::Large,
            _ => SizeClass::Other(s),
        }
    }
}

impl From<SizeClass> for String {
    fn from(size: SizeClass) -> Self {
        match size {
            SizeClass::Small => "small".to_string(),
            SizeClass::Medium => "medium".to_string(),
            SizeClass::Large => "large".to_string(),
            SizeClass::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SquareFootage {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl RoomAnalysis {
    pub fn new(image_id: impl Into<String>, room_type: impl Into<String>, flooring: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            room_type: room_type.into(),
            flooring: flooring.into(),
            windows: 0,
            lighting: String::new(),
            features: Vec::new(),
            dimensions: RoomDimensions::default(),
        }
    }

    pub fn with_windows(mut self, windows: u32) -> Self {
        self.windows = windows;
        self
    }

    pub fn with_lighting(mut self, lighting: impl Into<String>) -> Self {
        self.lighting = lighting.into();
        self
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dimensions(mut self, dimensions: RoomDimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Feature tags trimmed and lower-cased; blanks dropped, duplicates collapsed.
    pub fn feature_set(&self) -> HashSet<String> {
        self.features
            .iter()
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnalysisDocument {
    Many(Vec<RoomAnalysis>),
    One(RoomAnalysis),
}

/// Load analyses from a JSON file (one record or an array) or from a
/// directory of such files. Directory entries are read in file-name order;
/// a record without `imageId` takes its file stem.
pub fn load_analyses(path: &Path) -> Result<Vec<RoomAnalysis>, AnalysisError> {
    let analyses = if path.is_dir() {
        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("json"))
                        .unwrap_or(false)
            })
            .collect();
        files.sort();

        let mut analyses = Vec::new();
        for file in files {
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            analyses.extend(read_document(&file, Some(&stem))?);
        }
        analyses
    } else {
        read_document(path, None)?
    };

    if analyses.is_empty() {
        return Err(AnalysisError::Empty {
            path: path.to_string_lossy().to_string(),
        });
    }

    log::debug!("Loaded {} room analyses from {}", analyses.len(), path.display());
    Ok(analyses)
}

fn read_document(path: &Path, fallback_id: Option<&str>) -> Result<Vec<RoomAnalysis>, AnalysisError> {
    let content = fs::read_to_string(path)?;
    let document: AnalysisDocument =
        serde_json::from_str(&content).map_err(|source| AnalysisError::Json {
            path: path.to_string_lossy().to_string(),
            source,
        })?;

    let mut analyses = match document {
        AnalysisDocument::Many(many) => many,
        AnalysisDocument::One(one) => vec![one],
    };

    let single = analyses.len() == 1;
    for (index, analysis) in analyses.iter_mut().enumerate() {
        if !analysis.image_id.trim().is_empty() {
            continue;
        }
        match fallback_id {
            Some(id) if single => analysis.image_id = id.to_string(),
            _ => {
                return Err(AnalysisError::MissingImageId {
                    path: path.to_string_lossy().to_string(),
                    index,
                })
            }
        }
    }

    Ok(analyses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_for_missing_fields() {
        let json = r#"{"imageId":"img-1","roomType":"Bedroom","flooring":"carpet"}"#;
        let analysis: RoomAnalysis = serde_json::from_str(json).unwrap();

        assert_eq!(analysis.windows, 0);
        assert!(analysis.features.is_empty());
        assert!(analysis.lighting.is_empty());
        assert_eq!(analysis.dimensions, RoomDimensions::default());
    }

    #[test]
    fn test_null_fields_use_defaults() {
        let json = r#"{"imageId":"a","roomType":"Kitchen","flooring":"tile","windows":null,"features":null,"lighting":null,"dimensions":null}"#;
        let analysis: RoomAnalysis = serde_json::from_str(json).unwrap();

        assert_eq!(analysis.image_id, "a");
        assert_eq!(analysis.windows, 0);
        assert!(analysis.features.is_empty());
        assert!(analysis.lighting.is_empty());
        assert_eq!(analysis.dimensions, RoomDimensions::default());
    }

    #[test]
    fn test_null_image_id_takes_file_stem() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("den-1.json"),
            r#"{"imageId":null,"roomType":"Den","flooring":"carpet","windows":null}"#,
        )
        .unwrap();

        let analyses = load_analyses(temp_dir.path()).unwrap();
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].image_id, "den-1");
        assert_eq!(analyses[0].windows, 0);
    }

    #[test]
    fn test_dimensions_parse() {
        let json = r#"{
            "imageId": "img-2",
            "roomType": "Living Room",
            "flooring": "hardwood",
            "windows": 3,
            "dimensions": {
                "sizeClass": "Large",
                "ceilingHeight": 9.5,
                "squareFootage": { "min": 300, "max": 400 }
            }
        }"#;
        let analysis: RoomAnalysis = serde_json::from_str(json).unwrap();

        assert_eq!(analysis.dimensions.size_class, Some(SizeClass::Large));
        assert_eq!(analysis.dimensions.ceiling_height, Some(9.5));
        assert_eq!(
            analysis.dimensions.square_footage,
            Some(SquareFootage { min: Some(300), max: Some(400) })
        );
    }

    #[test]
    fn test_unknown_size_class_is_kept() {
        assert_eq!(
            SizeClass::from("cavernous".to_string()),
            SizeClass::Other("cavernous".to_string())
        );
        assert_eq!(String::from(SizeClass::Medium), "medium");
    }

    #[test]
    fn test_feature_set_normalizes() {
        let analysis = RoomAnalysis::new("a", "Kitchen", "tile")
            .with_features(["Island", " island ", "Pendant Lights", ""]);

        let set = analysis.feature_set();
        assert_eq!(set.len(), 2);
        assert!(set.contains("island"));
        assert!(set.contains("pendant lights"));
    }

    #[test]
    fn test_load_array_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("analyses.json");
        fs::write(
            &file,
            r#"[
                {"imageId":"a","roomType":"Kitchen","flooring":"tile"},
                {"imageId":"b","roomType":"Kitchen","flooring":"tile"}
            ]"#,
        )
        .unwrap();

        let analyses = load_analyses(&file).unwrap();
        let ids: Vec<&str> = analyses.iter().map(|a| a.image_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_load_directory_uses_file_stem() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("02-den.json"),
            r#"{"roomType":"Den","flooring":"carpet"}"#,
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("01-hall.json"),
            r#"{"imageId":"hall","roomType":"Hallway","flooring":"tile"}"#,
        )
        .unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"ignored").unwrap();

        let analyses = load_analyses(temp_dir.path()).unwrap();
        let ids: Vec<&str> = analyses.iter().map(|a| a.image_id.as_str()).collect();
        assert_eq!(ids, vec!["hall", "02-den"]);
    }

    #[test]
    fn test_missing_id_in_array_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("analyses.json");
        fs::write(
            &file,
            r#"[{"imageId":"a","roomType":"Kitchen","flooring":"tile"},
                {"roomType":"Kitchen","flooring":"tile"}]"#,
        )
        .unwrap();

        let result = load_analyses(&file);
        assert!(matches!(result, Err(AnalysisError::MissingImageId { index: 1, .. })));
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_analyses(temp_dir.path());
        assert!(matches!(result, Err(AnalysisError::Empty { .. })));
    }
}

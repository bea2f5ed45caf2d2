use crate::error::RunError;
use libprotocol::InputSource;
use libprotocol::schema::default_extensions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

pub const DEFAULT_IMAGE_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum InputItem {
    Image { path: PathBuf },
    Features { name: String, values: Vec<f64> },
}

impl InputItem {
    pub fn name(&self) -> String {
        match self {
            InputItem::Image { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            InputItem::Features { name, .. } => name.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InputItem::Image { .. } => "image",
            InputItem::Features { .. } => "features",
        }
    }
}

/// Non-empty, immutable input set shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct InputSet {
    items: Arc<[InputItem]>,
}

impl InputSet {
    pub fn new(items: Vec<InputItem>) -> Result<Self, RunError> {
        if items.is_empty() {
            return Err(RunError::NoInputs("the supplied input list".to_string()));
        }
        Ok(Self { items: items.into() })
    }

    /// Cyclic access: any index maps onto an item, so one item never starves a worker.
    pub fn get(&self, idx: usize) -> &InputItem {
        &self.items[idx % self.items.len()]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputItem> {
        self.items.iter()
    }

    pub fn load(source: &InputSource, base_dir: &Path) -> Result<Self, RunError> {
        match source {
            InputSource::Images { dir, limit, extensions } => {
                let exts = extensions.clone().unwrap_or_else(default_extensions);
                load_images(&base_dir.join(dir), limit.unwrap_or(DEFAULT_IMAGE_LIMIT), &exts)
            }
            InputSource::Features { path, limit } => load_features(&base_dir.join(path), *limit),
        }
    }
}

/// Walks `dir` in file-name order and keeps up to `limit` files whose name ends
/// with one of `extensions` (case-insensitive).
pub fn load_images(dir: &Path, limit: usize, extensions: &[String]) -> Result<InputSet, RunError> {
    let exts: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();
    let mut items = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| RunError::InputIo {
            path: dir.display().to_string(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if exts.iter().any(|ext| name.ends_with(ext.as_str())) {
            items.push(InputItem::Image { path: entry.into_path() });
            if items.len() >= limit {
                break;
            }
        }
    }
    if items.is_empty() {
        return Err(RunError::NoInputs(dir.display().to_string()));
    }
    InputSet::new(items)
}

#[derive(Deserialize)]
struct FeatureRecord {
    name: String,
    features: Vec<f64>,
}

/// Reads `[{"name": ..., "features": [...]}, ...]`, keeping at most `limit` records.
pub fn load_features(path: &Path, limit: Option<usize>) -> Result<InputSet, RunError> {
    let content = std::fs::read_to_string(path).map_err(|e| RunError::InputIo {
        path: path.display().to_string(),
        source: e,
    })?;
    let records: Vec<FeatureRecord> = serde_json::from_str(&content).map_err(|e| RunError::InputFormat {
        path: path.display().to_string(),
        source: e,
    })?;
    let items: Vec<InputItem> = records
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|r| InputItem::Features { name: r.name, values: r.features })
        .collect();
    if items.is_empty() {
        return Err(RunError::NoInputs(path.display().to_string()));
    }
    InputSet::new(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn it_wrap_around_cyclic_index() {
        let set = InputSet::new(vec![InputItem::Features { name: "only".to_string(), values: vec![1.0] }]).unwrap();
        assert_eq!(set.get(0).name(), "only");
        assert_eq!(set.get(17).name(), "only");
    }

    #[test]
    fn it_reject_empty_input_set() {
        assert!(matches!(InputSet::new(vec![]), Err(RunError::NoInputs(_))));
    }

    #[test]
    fn it_load_images_filtered_and_limited() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        std::fs::create_dir(tmp.path().join("nested"))?;
        for name in ["b.jpg", "a.PNG", "notes.txt", "nested/c.jpeg", "d.jpeg"] {
            std::fs::write(tmp.path().join(name), b"img")?;
        }

        let set = load_images(tmp.path(), 10, &default_extensions())?;
        let names: Vec<String> = set.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["a.PNG", "b.jpg", "d.jpeg", "c.jpeg"]);

        let limited = load_images(tmp.path(), 2, &default_extensions())?;
        assert_eq!(limited.len(), 2);
        Ok(())
    }

    #[test]
    fn it_report_no_inputs_for_empty_dir() {
        let tmp = tempdir().unwrap();
        let err = load_images(tmp.path(), 10, &default_extensions()).unwrap_err();
        assert!(matches!(err, RunError::NoInputs(_)));
    }

    #[test]
    fn it_load_feature_records() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("features.json");
        std::fs::write(&path, r#"[{"name":"a","features":[1.0,2.0]},{"name":"b","features":[3.0]}]"#)?;

        let set = load_features(&path, Some(1))?;
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0), &InputItem::Features { name: "a".to_string(), values: vec![1.0, 2.0] });

        std::fs::write(&path, "[]")?;
        assert!(matches!(load_features(&path, None), Err(RunError::NoInputs(_))));

        std::fs::write(&path, "{")?;
        assert!(matches!(load_features(&path, None), Err(RunError::InputFormat { .. })));
        Ok(())
    }
}

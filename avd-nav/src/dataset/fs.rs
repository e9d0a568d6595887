use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::info;

use super::errors::DatasetError;
use super::targets::collect_target_candidates;
use super::types::{
    BoundingBox, Image, InstanceId, InstanceNames, SceneAnnotations, TargetRef, ViewpointRecord,
};
use super::{Dataset, PositionTable};
use crate::env::Action;

const INSTANCE_MAP_FILE: &str = "all_instance_id_map.txt";
const PRESENT_INSTANCES_FILE: &str = "present_instance_names.txt";
const ANNOTATIONS_FILE: &str = "annotations.json";
const INITIAL_POSITIONS_FILE: &str = "initial_positions.json";
const DESTINATIONS_FILE: &str = "destinations.json";
const IMAGE_DIR: &str = "jpg_rgb";

#[derive(Debug, Deserialize)]
struct RawAnnotation {
    #[serde(default)]
    bounding_boxes: Vec<Vec<i64>>,
    #[serde(default)]
    forward: String,
    #[serde(default)]
    backward: String,
    #[serde(default)]
    rotate_cw: String,
    #[serde(default)]
    rotate_ccw: String,
}

impl RawAnnotation {
    fn into_record(self, name: String) -> Result<ViewpointRecord, DatasetError> {
        let boxes = self
            .bounding_boxes
            .iter()
            .map(|raw| BoundingBox::from_raw(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let neighbours = [
            (Action::Forward, self.forward),
            (Action::Backward, self.backward),
            (Action::RotateCw, self.rotate_cw),
            (Action::RotateCcw, self.rotate_ccw),
        ]
        .into_iter()
        .filter(|(_, target)| !target.is_empty())
        .collect();
        Ok(ViewpointRecord {
            name,
            boxes,
            neighbours,
        })
    }
}

/// Active Vision Dataset directory layout.
///
/// ```text
/// root/all_instance_id_map.txt          "<name> <id>" per line
/// root/<scene>/annotations.json
/// root/<scene>/present_instance_names.txt
/// root/<scene>/initial_positions.json   {"<id>": ["<frame>", ...]}
/// root/<scene>/destinations.json        optional, same shape
/// root/<scene>/jpg_rgb/<frame>
/// targets/<view type>/<instance>_<suffix>
/// ```
#[derive(Debug, Clone)]
pub struct FsDataset {
    root: PathBuf,
    names: InstanceNames,
    targets: HashMap<InstanceId, Vec<Vec<TargetRef>>>,
}

impl FsDataset {
    pub fn open(root: impl AsRef<Path>, target_root: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let root = root.as_ref().to_path_buf();
        let names = read_instance_map(&root.join(INSTANCE_MAP_FILE))?;
        let targets = collect_target_candidates(target_root.as_ref(), &names)?;
        info!(
            root = %root.display(),
            instances = names.len(),
            with_targets = targets.len(),
            "opened dataset"
        );
        Ok(Self {
            root,
            names,
            targets,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scene_dir(&self, scene: &str) -> Result<PathBuf, DatasetError> {
        let dir = self.root.join(scene);
        if !dir.is_dir() {
            return Err(DatasetError::not_found("scene", scene));
        }
        Ok(dir)
    }
}

impl Dataset for FsDataset {
    fn scenes(&self) -> Result<Vec<String>, DatasetError> {
        let read = fs::read_dir(&self.root).map_err(|e| DatasetError::io(&self.root, e))?;
        let mut scenes = Vec::new();
        for entry in read {
            let path = entry.map_err(|e| DatasetError::io(&self.root, e))?.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                scenes.push(name.to_string());
            }
        }
        scenes.sort();
        Ok(scenes)
    }

    fn instance_names(&self) -> Result<InstanceNames, DatasetError> {
        Ok(self.names.clone())
    }

    fn present_instances(&self, scene: &str) -> Result<Vec<InstanceId>, DatasetError> {
        let path = self.scene_dir(scene)?.join(PRESENT_INSTANCES_FILE);
        let text = fs::read_to_string(&path).map_err(|e| DatasetError::io(&path, e))?;
        text.lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(|name| {
                self.names
                    .id(name)
                    .ok_or_else(|| DatasetError::UnknownInstance(name.to_string()))
            })
            .collect()
    }

    fn annotations(&self, scene: &str) -> Result<SceneAnnotations, DatasetError> {
        let path = self.scene_dir(scene)?.join(ANNOTATIONS_FILE);
        let raw: HashMap<String, RawAnnotation> = read_json(&path)?;
        let records = raw
            .into_iter()
            .map(|(name, annotation)| annotation.into_record(name))
            .collect::<Result<Vec<_>, _>>()?;
        SceneAnnotations::from_records(scene, records)
    }

    fn initial_positions(&self, scene: &str) -> Result<PositionTable, DatasetError> {
        read_json(&self.scene_dir(scene)?.join(INITIAL_POSITIONS_FILE))
    }

    fn destinations(&self, scene: &str) -> Result<Option<PositionTable>, DatasetError> {
        let path = self.scene_dir(scene)?.join(DESTINATIONS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    fn load_image(&self, scene: &str, viewpoint: &str) -> Result<Image, DatasetError> {
        decode_image(&self.scene_dir(scene)?.join(IMAGE_DIR).join(viewpoint))
    }

    fn target_candidates(&self, instance: InstanceId) -> Result<Vec<Vec<TargetRef>>, DatasetError> {
        Ok(self.targets.get(&instance).cloned().unwrap_or_default())
    }

    fn load_target(&self, target: &TargetRef) -> Result<Image, DatasetError> {
        decode_image(target.path())
    }
}

fn read_instance_map(path: &Path) -> Result<InstanceNames, DatasetError> {
    let text = fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
    let mut pairs = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let mut fields = line.split_whitespace();
        let (Some(name), Some(id)) = (fields.next(), fields.next()) else {
            return Err(DatasetError::Malformed(format!(
                "{}: expected `<name> <id>`, got {line:?}",
                path.display()
            )));
        };
        let id: InstanceId = id.parse().map_err(|_| {
            DatasetError::Malformed(format!("{}: bad instance id {id:?}", path.display()))
        })?;
        pairs.push((id, name.to_string()));
    }
    InstanceNames::from_pairs(pairs)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DatasetError> {
    let text = fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn decode_image(path: &Path) -> Result<Image, DatasetError> {
    if !path.is_file() {
        return Err(DatasetError::not_found("image", path.display().to_string()));
    }
    let rgb = image::open(path)
        .map_err(|source| DatasetError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    Image::from_shape_vec((height as usize, width as usize, 3), rgb.into_raw())
        .map_err(|e| DatasetError::Malformed(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ViewpointId;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn fixture() -> (tempfile::TempDir, tempfile::TempDir) {
        let root = tempfile::tempdir().unwrap();
        let targets = tempfile::tempdir().unwrap();
        let r = root.path();

        write(&r.join(INSTANCE_MAP_FILE), "mug 1\nbottle 2\n\n");
        write(&r.join("Home_01/present_instance_names.txt"), "mug 3\n");
        write(
            &r.join("Home_01/annotations.json"),
            r#"{
                "a.png": {"bounding_boxes": [[0, 0, 10, 10, 1, 1]], "forward": "b.png", "backward": "", "left": ""},
                "b.png": {"bounding_boxes": [], "backward": "a.png"}
            }"#,
        );
        write(&r.join("Home_01/initial_positions.json"), r#"{"1": ["a.png"]}"#);
        write(&r.join("notes.txt"), "not a scene");

        let img_dir = r.join("Home_01").join(IMAGE_DIR);
        fs::create_dir_all(&img_dir).unwrap();
        image::RgbImage::from_pixel(5, 3, image::Rgb([200, 10, 10]))
            .save(img_dir.join("a.png"))
            .unwrap();

        let view = targets.path().join("0_front");
        fs::create_dir_all(&view).unwrap();
        image::RgbImage::new(2, 2).save(view.join("mug_1.png")).unwrap();

        (root, targets)
    }

    #[test]
    fn reads_avd_layout() {
        let (root, targets) = fixture();
        let ds = FsDataset::open(root.path(), targets.path()).unwrap();

        assert_eq!(ds.scenes().unwrap(), vec!["Home_01".to_string()]);
        assert_eq!(ds.present_instances("Home_01").unwrap(), vec![1]);

        let ann = ds.annotations("Home_01").unwrap();
        assert_eq!(ann.len(), 2);
        let a = ann.get(ViewpointId(0)).unwrap();
        assert_eq!(a.name, "a.png");
        assert_eq!(a.adjacency.get(Action::Forward), Some(ViewpointId(1)));
        assert_eq!(a.adjacency.get(Action::Backward), None);
        assert_eq!(a.boxes[0].difficulty, 1);

        assert_eq!(ds.initial_positions("Home_01").unwrap()[&1], vec!["a.png"]);
        assert!(ds.destinations("Home_01").unwrap().is_none());

        let img = ds.load_image("Home_01", "a.png").unwrap();
        assert_eq!(img.dim(), (3, 5, 3));
        assert_eq!(img[[0, 0, 0]], 200);

        let refs = ds.target_candidates(1).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(ds.load_target(&refs[0][0]).unwrap().dim(), (2, 2, 3));
        assert!(ds.target_candidates(2).unwrap().is_empty());
    }

    #[test]
    fn missing_pieces_are_not_found() {
        let (root, targets) = fixture();
        let ds = FsDataset::open(root.path(), targets.path()).unwrap();

        assert!(matches!(
            ds.annotations("Nowhere"),
            Err(DatasetError::NotFound { what: "scene", .. })
        ));
        assert!(matches!(
            ds.load_image("Home_01", "b.png"),
            Err(DatasetError::NotFound { .. })
        ));
    }

    #[test]
    fn unknown_present_instance_is_an_error() {
        let (root, targets) = fixture();
        write(
            &root.path().join("Home_01/present_instance_names.txt"),
            "teapot 1\n",
        );
        let ds = FsDataset::open(root.path(), targets.path()).unwrap();
        assert!(matches!(
            ds.present_instances("Home_01"),
            Err(DatasetError::UnknownInstance(_))
        ));
    }
}

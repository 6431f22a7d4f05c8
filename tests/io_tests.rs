use std::fs;
use std::path::{Path, PathBuf};

use coco_curator::pipeline::{process_convert, process_count, process_fix, run};
use coco_curator::{
    load_dataset, save_dataset, CocoError, Command, Dataset, FsImageStore, IdOrigin,
    ImageAnnotation, ImageStore, SourceRecord, Vocabulary,
};
use tempfile::tempdir;

const SHORT_POLYGON_DOCUMENT: &str = r#"{
    "info": {"description": "fixture"},
    "images": [{"id": 0, "file_name": "0001.png", "width": 3, "height": 2}],
    "annotations": [{"id": 0, "image_id": 0, "category_id": 1,
        "segmentation": [[0, 0, 2, 0, 2, 1]], "area": 2, "bbox": [0, 0, 2, 1], "iscrowd": 0}],
    "categories": [{"id": 1, "name": "car", "supercategory": "none"}]
}"#;

fn write_png(path: &Path, width: u32, height: u32) {
    image::RgbImage::new(width, height).save(path).unwrap();
}

fn write_labelme(dir: &Path, stem: &str, label: &str) {
    let json = format!(
        r#"{{
            "version": "5.2.1",
            "flags": {{}},
            "shapes": [{{"label": "{}", "points": [[0, 0], [2, 0], [2, 1]],
                "group_id": null, "shape_type": "polygon", "flags": {{}}}}],
            "imagePath": "{}.png",
            "imageData": null,
            "imageHeight": 2,
            "imageWidth": 3
        }}"#,
        label, stem
    );
    fs::write(dir.join(format!("{}.json", stem)), json).unwrap();
}

fn record_for(image_path: PathBuf, image_data: Option<String>) -> SourceRecord {
    SourceRecord {
        name: "a.json".to_string(),
        image_path,
        annotation: ImageAnnotation {
            version: String::new(),
            flags: None,
            shapes: Vec::new(),
            image_path: "a.png".to_string(),
            image_data,
            image_height: 2,
            image_width: 3,
        },
    }
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("coco.json");

    let mut dataset = Dataset::new(IdOrigin::One);
    dataset.set_info(Some(serde_json::json!({"year": 2024})));
    let image = dataset.add_image("0001.png", 3, 2).unwrap();
    let car = dataset.add_category("car", "vehicle").unwrap();
    dataset
        .add_annotation(image, car, vec![vec![0.0, 0.0, 2.0, 0.0, 2.0, 1.0, 1.0, 1.5, 0.0, 1.0]], 0)
        .unwrap();

    save_dataset(&path, &dataset).unwrap();
    let loaded = load_dataset(&path).unwrap();

    assert_eq!(loaded.images(), dataset.images());
    assert_eq!(loaded.annotations(), dataset.annotations());
    assert_eq!(loaded.categories(), dataset.categories());
    assert_eq!(loaded.info(), dataset.info());
    assert!(loaded.licenses().is_none());

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\n    \"images\": ["));
    assert!(!raw.contains("licenses"));
}

#[test]
fn test_save_leaves_no_temporary_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("coco.json");
    save_dataset(&path, &Dataset::new(IdOrigin::Zero)).unwrap();
    save_dataset(&path, &Dataset::new(IdOrigin::Zero)).unwrap();

    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[cfg(unix)]
#[test]
fn test_save_keeps_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let fresh = dir.path().join("fresh.json");
    save_dataset(&fresh, &Dataset::new(IdOrigin::Zero)).unwrap();
    assert_eq!(fs::metadata(&fresh).unwrap().permissions().mode() & 0o777, 0o644);

    let existing = dir.path().join("existing.json");
    fs::write(&existing, "{}").unwrap();
    fs::set_permissions(&existing, fs::Permissions::from_mode(0o640)).unwrap();
    save_dataset(&existing, &Dataset::new(IdOrigin::Zero)).unwrap();
    assert_eq!(fs::metadata(&existing).unwrap().permissions().mode() & 0o777, 0o640);
}

#[cfg(unix)]
#[test]
fn test_fix_in_place_keeps_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let path = dir.path().join("coco.json");
    fs::write(&path, SHORT_POLYGON_DOCUMENT).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

    process_fix(&path, &path).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o644);
}

#[test]
fn test_load_missing_file() {
    let dir = tempdir().unwrap();
    let result = load_dataset(&dir.path().join("missing.json"));
    assert!(matches!(result, Err(CocoError::Io { .. })));
}

#[test]
fn test_load_invalid_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{\"images\": [").unwrap();
    assert!(matches!(load_dataset(&path), Err(CocoError::Json { .. })));
}

#[test]
fn test_image_store_copies_file() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a.png");
    write_png(&source, 3, 2);

    let mut store = FsImageStore::new(&dir.path().join("out")).unwrap();
    let stored = store
        .store(&record_for(source, None), "0001.png")
        .unwrap();

    assert_eq!(stored, dir.path().join("out").join("0001.png"));
    assert!(stored.exists());
    assert_eq!(store.dimensions(&stored).unwrap(), (3, 2));
}

#[test]
fn test_image_store_decodes_embedded_data() {
    let dir = tempdir().unwrap();
    let encoded = dir.path().join("encoded.png");
    write_png(&encoded, 4, 5);
    let data = base64::encode(fs::read(&encoded).unwrap());

    let mut store = FsImageStore::new(&dir.path().join("out")).unwrap();
    let record = record_for(dir.path().join("missing.png"), Some(data));
    let stored = store.store(&record, "0001.png").unwrap();

    assert_eq!(store.dimensions(&stored).unwrap(), (4, 5));
}

#[test]
fn test_image_store_without_image() {
    let dir = tempdir().unwrap();
    let mut store = FsImageStore::new(dir.path()).unwrap();
    let record = record_for(dir.path().join("missing.png"), None);

    assert!(matches!(
        store.store(&record, "0001.png"),
        Err(CocoError::Io { .. })
    ));
}

#[test]
fn test_process_convert() {
    let dir = tempdir().unwrap();
    let labelme = dir.path().join("labelme");
    fs::create_dir(&labelme).unwrap();
    for stem in ["b", "a"] {
        write_png(&labelme.join(format!("{}.png", stem)), 3, 2);
        write_labelme(&labelme, stem, "car");
    }
    let img_dir = dir.path().join("images");
    let output = dir.path().join("coco.json");

    process_convert(&labelme, &img_dir, &output, &Vocabulary::new(["bus", "car"], "none")).unwrap();

    let dataset = load_dataset(&output).unwrap();
    let names: Vec<&str> = dataset.images().iter().map(|i| i.file_name.as_str()).collect();
    assert_eq!(names, ["0001.png", "0002.png"]);
    assert_eq!(dataset.images()[0].id, 0);
    assert_eq!((dataset.images()[0].width, dataset.images()[0].height), (3, 2));
    assert_eq!(dataset.categories().len(), 2);
    assert!(dataset.annotations().iter().all(|a| a.category_id == 2));
    assert!(dataset.validate().is_empty());
    assert!(img_dir.join("0001.png").exists());
    assert!(img_dir.join("0002.png").exists());
}

#[test]
fn test_process_convert_unknown_label_writes_nothing() {
    let dir = tempdir().unwrap();
    let labelme = dir.path().join("labelme");
    fs::create_dir(&labelme).unwrap();
    write_png(&labelme.join("a.png"), 3, 2);
    write_labelme(&labelme, "a", "tree");
    let img_dir = dir.path().join("images");
    let output = dir.path().join("coco.json");

    let result = process_convert(&labelme, &img_dir, &output, &Vocabulary::new(["car"], "none"));

    assert!(matches!(result, Err(CocoError::UnknownCategory(_))));
    assert!(!output.exists());
    assert!(!img_dir.join("0001.png").exists());
}

#[test]
fn test_process_fix_in_place() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("coco.json");
    fs::write(&path, SHORT_POLYGON_DOCUMENT).unwrap();
    assert!(!load_dataset(&path).unwrap().validate().is_empty());

    process_fix(&path, &path).unwrap();

    let repaired = load_dataset(&path).unwrap();
    assert!(repaired.validate().is_empty());
    assert_eq!(repaired.annotations()[0].bbox, [0.0, 0.0, 2.0, 1.0]);
    assert_eq!(repaired.info().unwrap()["description"], "fixture");
}

#[test]
fn test_process_count() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("coco.json");
    fs::write(&path, SHORT_POLYGON_DOCUMENT).unwrap();

    assert_eq!(process_count(&path, Some(0)).unwrap(), 1.0);
    assert_eq!(process_count(&path, None).unwrap(), 1.0);
    assert!(matches!(
        process_count(&path, Some(9)),
        Err(CocoError::UnknownImage(9))
    ));
}

#[test]
fn test_run_validate() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("coco.json");
    fs::write(&path, SHORT_POLYGON_DOCUMENT).unwrap();

    let violations = run(&Command::Validate { input: path.clone() }).unwrap();
    assert_eq!(violations.len(), 1);

    run(&Command::Fix {
        input: path.clone(),
        output: None,
    })
    .unwrap();
    assert!(run(&Command::Validate { input: path }).unwrap().is_empty());
}

#[test]
fn test_run_split_and_merge() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("coco.json");
    let mut dataset = Dataset::new(IdOrigin::Zero);
    let car = dataset.add_category("car", "none").unwrap();
    for i in 0..5 {
        let image = dataset.add_image(&format!("{:04}.png", i + 1), 8, 8).unwrap();
        dataset
            .add_annotation(image, car, vec![vec![0.0, 0.0, 4.0, 0.0, 4.0, 4.0, 2.0, 6.0, 0.0, 4.0]], 0)
            .unwrap();
    }
    save_dataset(&input, &dataset).unwrap();

    let train = dir.path().join("train.json");
    let val = dir.path().join("val.json");
    run(&Command::Split {
        input,
        train: train.clone(),
        val: val.clone(),
        val_size: 0.2,
        seed: 42,
    })
    .unwrap();
    assert_eq!(load_dataset(&train).unwrap().images().len(), 4);
    assert_eq!(load_dataset(&val).unwrap().images().len(), 1);

    let merged = dir.path().join("merged.json");
    run(&Command::Merge {
        inputs: vec![train, val],
        output: merged.clone(),
        category_merge: coco_curator::CategoryMerge::Name,
    })
    .unwrap();
    let merged = load_dataset(&merged).unwrap();
    assert_eq!(
        merged.images().iter().map(|i| i.id).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
    assert_eq!(merged.categories().len(), 1);
    assert!(merged.validate().is_empty());
}

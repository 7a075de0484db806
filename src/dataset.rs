use log::{error, info, warn};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::config::{ImporterConfig, ANNOTATIONS_DIR, IMAGES_DIR, IMAGE_SETS_DIR};
use crate::conversion::convert_item;
use crate::download::ImageFetcher;
use crate::error::ImportError;
use crate::types::{ImportReport, ItemOutcome, SplitSizes};
use crate::utils::image_id;

/// Manifests truncated at the start of every split pass.
pub const MANIFESTS: &[&str] = &["train.txt", "trainval.txt", "test.txt", "val.txt"];

/// Create the Pascal VOC directory layout, keeping whatever is already there.
pub fn setup_output_directories(pascal_voc_dir: &Path) -> std::io::Result<()> {
    for dir in [IMAGE_SETS_DIR, ANNOTATIONS_DIR, IMAGES_DIR] {
        fs::create_dir_all(pascal_voc_dir.join(dir))?;
    }
    Ok(())
}

/// Check the importer can run and return the non-blank lines of the export.
pub fn read_export(config: &ImporterConfig) -> Result<Vec<String>, ImportError> {
    if !config.image_dir.is_dir() {
        return Err(ImportError::Precondition(format!(
            "Please specify a valid directory path to download images, {} doesn't exist",
            config.image_dir.display()
        )));
    }
    if !config.annotation_dir.is_dir() {
        return Err(ImportError::Precondition(format!(
            "Please specify a valid directory path to write Pascal VOC xml files, {} doesn't exist",
            config.annotation_dir.display()
        )));
    }
    if !config.export_path.exists() {
        return Err(ImportError::Precondition(format!(
            "Please specify a valid path to dataturks JSON output file, {} doesn't exist",
            config.export_path.display()
        )));
    }

    let reader = BufReader::new(File::open(&config.export_path)?);
    let lines = reader.lines().collect::<std::io::Result<Vec<_>>>()?;
    if lines.iter().all(|line| line.trim().is_empty()) {
        return Err(ImportError::Precondition(format!(
            "Please specify a valid path to dataturks JSON output file, {} is empty",
            config.export_path.display()
        )));
    }

    Ok(lines)
}

/// Progress line logged after every tenth line of the export.
pub fn progress_message(lines_read: usize) -> Option<String> {
    (lines_read > 0 && lines_read % 10 == 0).then(|| format!("{} items done ...", lines_read))
}

/// Convert every line independently; a failing line never stops the batch.
pub fn import_items(
    lines: &[String],
    config: &ImporterConfig,
    fetcher: &dyn ImageFetcher,
) -> ImportReport {
    let mut report = ImportReport::new();

    for line in lines {
        if line.trim().is_empty() {
            report.blank_lines += 1;
        } else {
            report.total_items += 1;
            match convert_item(line, config, fetcher) {
                Ok(ItemOutcome::Converted(annotation)) => report.record_converted(&annotation),
                Ok(ItemOutcome::Skipped) => report.increment_skipped(),
                Err(e) => {
                    error!("Unable to process item {}\nerror = {}", line, e);
                    report.increment_failed();
                }
            }
        }

        // blank lines count towards progress too
        report.lines_read += 1;
        if let Some(message) = progress_message(report.lines_read) {
            info!("{}", message);
        }
    }

    report
}

/// Split a listing into `(test, trainval)`: the first `floor(len * test_percent)`
/// entries form the test set. Listing order is kept as is.
pub fn split_images(mut images: Vec<String>, test_percent: f64) -> (Vec<String>, Vec<String>) {
    let test_count = ((images.len() as f64 * test_percent).floor() as usize).min(images.len());
    let trainval = images.split_off(test_count);
    (images, trainval)
}

/// File names in the image directory, in filesystem enumeration order.
pub fn list_images(image_dir: &Path) -> std::io::Result<Vec<String>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(image_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            images.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(images)
}

/// Write the ids of `images` into `manifest`, renaming each annotation from
/// `<name>.jpg.xml` to `<name>.xml` on the way. Returns the number of ids written.
pub fn write_manifest(
    manifest: &Path,
    images: &[String],
    annotation_dir: &Path,
) -> std::io::Result<usize> {
    let mut writer = BufWriter::new(File::create(manifest)?);
    let mut written = 0;

    for file_name in images {
        let id = image_id(file_name);
        let annotation = annotation_dir.join(format!("{}.xml", file_name));
        let renamed = annotation_dir.join(format!("{}.xml", id));

        if annotation.exists() {
            if annotation != renamed {
                fs::rename(&annotation, &renamed)?;
            }
        } else if !renamed.exists() {
            warn!(
                "No annotation for image {}, leaving it out of {}",
                file_name,
                manifest.display()
            );
            continue;
        }

        writeln!(writer, "{}", id)?;
        written += 1;
    }

    writer.flush()?;
    Ok(written)
}

/// Regenerate the split manifests from the image directory listing.
pub fn write_split_manifests(config: &ImporterConfig) -> std::io::Result<SplitSizes> {
    for manifest in MANIFESTS {
        File::create(config.image_sets_dir.join(manifest))?;
    }

    let images = list_images(&config.image_dir)?;
    let (test_set, trainval_set) = split_images(images, config.test_percent);

    let trainval = write_manifest(
        &config.image_sets_dir.join("trainval.txt"),
        &trainval_set,
        &config.annotation_dir,
    )?;
    let test = write_manifest(
        &config.image_sets_dir.join("test.txt"),
        &test_set,
        &config.annotation_dir,
    )?;

    Ok(SplitSizes { trainval, test })
}

/// Import the whole export, then write the split manifests.
pub fn run_import(
    config: &ImporterConfig,
    fetcher: &dyn ImageFetcher,
) -> Result<ImportReport, ImportError> {
    let lines = read_export(config)?;

    info!("Converting {} lines...", lines.len());
    let mut report = import_items(&lines, config, fetcher);

    info!("Writing split manifests...");
    report.splits = write_split_manifests(config)?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("image{}.jpg", i)).collect()
    }

    struct NoFetch;

    impl ImageFetcher for NoFetch {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, ImportError> {
            Err(ImportError::Download {
                url: url.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    #[test]
    fn test_progress_message_every_ten_lines() {
        assert_eq!(progress_message(0), None);
        assert_eq!(progress_message(9), None);
        assert_eq!(progress_message(10).as_deref(), Some("10 items done ..."));
        assert_eq!(progress_message(15), None);
        assert_eq!(progress_message(20).as_deref(), Some("20 items done ..."));
    }

    #[test]
    fn test_import_items_counts_blank_lines_as_read() {
        let dir = tempfile::tempdir().unwrap();
        let config = ImporterConfig::new(dir.path().join("export.json"), dir.path(), 0.1);
        let mut lines = vec![String::new(); 3];
        lines.extend((0..7).map(|_| r#"{"content": "a.jpg", "annotation": []}"#.to_string()));

        let report = import_items(&lines, &config, &NoFetch);

        assert_eq!(report.lines_read, 10);
        assert_eq!(report.blank_lines, 3);
        assert_eq!(report.total_items, 7);
        assert_eq!(report.skipped, 7);
        assert!(progress_message(report.lines_read).is_some());
    }

    #[test]
    fn test_split_images() {
        let (test, trainval) = split_images(names(10), 0.2);

        assert_eq!(test, vec!["image0.jpg", "image1.jpg"]);
        assert_eq!(trainval.len(), 8);
        assert_eq!(trainval[0], "image2.jpg");
    }

    #[test]
    fn test_split_images_floors() {
        let (test, trainval) = split_images(names(5), 0.3);
        assert_eq!((test.len(), trainval.len()), (1, 4));

        let (test, trainval) = split_images(names(10), 0.7);
        assert_eq!((test.len(), trainval.len()), (7, 3));

        let (test, trainval) = split_images(names(3), 1.0);
        assert_eq!((test.len(), trainval.len()), (3, 0));
    }

    #[test]
    fn test_write_manifest_renames_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let annotations = dir.path().join("Annotations");
        fs::create_dir(&annotations).unwrap();
        fs::write(annotations.join("a.jpg.xml"), "<annotation/>").unwrap();
        fs::write(annotations.join("b.xml"), "<annotation/>").unwrap();
        let manifest = dir.path().join("trainval.txt");

        let images = vec!["a.jpg".to_string(), "b.jpg".to_string(), "c.jpg".to_string()];
        let written = write_manifest(&manifest, &images, &annotations).unwrap();

        assert_eq!(written, 2);
        assert_eq!(fs::read_to_string(&manifest).unwrap(), "a\nb\n");
        assert!(annotations.join("a.xml").exists());
        assert!(!annotations.join("a.jpg.xml").exists());
    }

    #[test]
    fn test_read_export_preconditions() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("export.json");
        let config = ImporterConfig::new(&export, dir.path().join("voc"), 0.1);

        assert!(matches!(
            read_export(&config),
            Err(ImportError::Precondition(_))
        ));

        setup_output_directories(&dir.path().join("voc")).unwrap();
        assert!(matches!(
            read_export(&config),
            Err(ImportError::Precondition(_))
        ));

        fs::write(&export, "\n\n").unwrap();
        assert!(matches!(
            read_export(&config),
            Err(ImportError::Precondition(_))
        ));

        fs::write(&export, "{}\n").unwrap();
        assert_eq!(read_export(&config).unwrap(), vec!["{}"]);
    }
}

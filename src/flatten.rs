//! Flatten Pascal VOC annotations into one index line per image:
//! the absolute image path followed by ` xmin,ymin,xmax,ymax,class_id` per box.

use log::info;
use serde::Deserialize;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::{FlattenerConfig, ImageSet};
use crate::error::FlattenError;
use crate::utils::create_progress_bar;

#[derive(Debug, Deserialize)]
struct AnnotationFile {
    #[serde(rename = "object", default)]
    objects: Vec<ObjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    name: String,
    #[serde(default)]
    bndbox: Option<BndBoxEntry>,
}

#[derive(Debug, Deserialize)]
struct BndBoxEntry {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

/// A box kept for the index, with its class id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedBox {
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
    pub class_id: usize,
}

impl fmt::Display for IndexedBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " {},{},{},{},{}",
            self.xmin, self.ymin, self.xmax, self.ymax, self.class_id
        )
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> FlattenError + '_ {
    move |source| FlattenError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Whitespace-separated image ids of a split manifest.
pub fn read_image_ids(manifest: &Path) -> Result<Vec<String>, FlattenError> {
    let content = fs::read_to_string(manifest).map_err(io_error(manifest))?;
    Ok(content.split_whitespace().map(str::to_string).collect())
}

/// Boxes of an annotation whose class is in the class list, in document order.
/// Coordinates are parsed as floats and truncated.
pub fn annotation_boxes(
    xml_path: &Path,
    classes: &[String],
) -> Result<Vec<IndexedBox>, FlattenError> {
    let content = fs::read_to_string(xml_path).map_err(io_error(xml_path))?;
    let annotation: AnnotationFile =
        quick_xml::de::from_str(&content).map_err(|source| FlattenError::Xml {
            path: xml_path.to_path_buf(),
            source,
        })?;

    let mut boxes = Vec::with_capacity(annotation.objects.len());
    for object in annotation.objects {
        let Some(class_id) = classes.iter().position(|class| *class == object.name) else {
            continue;
        };
        // only boxes of known classes are required
        let bndbox = object.bndbox.ok_or_else(|| FlattenError::MissingBndBox {
            path: xml_path.to_path_buf(),
            name: object.name.clone(),
        })?;
        boxes.push(IndexedBox {
            xmin: bndbox.xmin as i64,
            ymin: bndbox.ymin as i64,
            xmax: bndbox.xmax as i64,
            ymax: bndbox.ymax as i64,
            class_id,
        });
    }
    Ok(boxes)
}

/// Path of the index file written for a set.
pub fn index_path(config: &FlattenerConfig, set: &ImageSet) -> PathBuf {
    config
        .output_dir
        .join(format!("{}_{}.txt", set.year, set.split))
}

/// Write the index file of one `(year, split)` set. Returns the number of lines.
pub fn flatten_set(config: &FlattenerConfig, set: &ImageSet) -> Result<usize, FlattenError> {
    let voc_dir = config.voc_dir(&set.year);
    let image_ids = read_image_ids(
        &voc_dir
            .join("ImageSets/Main")
            .join(format!("{}.txt", set.split)),
    )?;

    let output = index_path(config, set);
    let mut writer = BufWriter::new(File::create(&output).map_err(io_error(&output))?);
    let pb = create_progress_bar(image_ids.len() as u64, &set.to_string());

    for image_id in &image_ids {
        let image_path = voc_dir
            .join("JPEGImages")
            .join(format!("{}.jpg", image_id));
        let boxes = annotation_boxes(
            &voc_dir.join("Annotations").join(format!("{}.xml", image_id)),
            &config.classes,
        )?;

        let mut line = image_path.display().to_string();
        for indexed in &boxes {
            line.push_str(&indexed.to_string());
        }
        writeln!(writer, "{}", line).map_err(io_error(&output))?;
        pb.inc(1);
    }

    writer.flush().map_err(io_error(&output))?;
    pb.finish_with_message(format!("{} complete", set));
    Ok(image_ids.len())
}

/// Flatten every configured set. The first error ends the run.
pub fn run_flatten(config: &FlattenerConfig) -> Result<(), FlattenError> {
    for set in &config.sets {
        let lines = flatten_set(config, set)?;
        info!(
            "Wrote {} lines to {}",
            lines,
            index_path(config, set).display()
        );
    }
    Ok(())
}

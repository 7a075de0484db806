use log::{debug, info, warn};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::ImporterConfig;
use crate::download::{maybe_download, ImageFetcher};
use crate::error::ImportError;
use crate::types::{
    Corners, ItemOutcome, LabeledItem, Point, Rectangle, Region, VocAnnotation, VocObject,
};
use crate::utils::image_dimensions;

const UNSPECIFIED: &str = "Unspecified";

/// Bounding box of four corners given in any order.
pub fn four_corner_rectangle(points: &[Point; 4], width: u32, height: u32) -> Rectangle {
    let (x_min, y_min, x_max, y_max) = points.iter().fold(
        (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
        |(x_min, y_min, x_max, y_max), p| {
            (x_min.min(p.x), y_min.min(p.y), x_max.max(p.x), y_max.max(p.y))
        },
    );
    let (width, height) = (width as f64, height as f64);

    Rectangle {
        xmin: (width * x_min) as i64,
        ymin: (height * y_min) as i64,
        xmax: (width * x_max) as i64,
        ymax: (height * y_max) as i64,
    }
}

/// Box whose first point is the top-left and second the bottom-right corner.
/// The points are taken literally, without reordering.
pub fn two_corner_rectangle(points: &[Point; 2], width: u32, height: u32) -> Rectangle {
    let [top_left, bottom_right] = points;
    let (width, height) = (width as f64, height as f64);

    Rectangle {
        xmin: (top_left.x * width) as i64,
        ymin: (top_left.y * height) as i64,
        xmax: (bottom_right.x * width) as i64,
        ymax: (bottom_right.y * height) as i64,
    }
}

impl Corners {
    pub fn to_rectangle(&self, width: u32, height: u32) -> Rectangle {
        match self {
            Corners::FourCorner(points) => four_corner_rectangle(points, width, height),
            Corners::TwoCorner(points) => two_corner_rectangle(points, width, height),
        }
    }
}

/// Convert the rectangle regions of an item into VOC objects, one per label.
pub fn region_objects(
    regions: &[&Region],
    config: &ImporterConfig,
    width: u32,
    height: u32,
) -> Result<Vec<VocObject>, ImportError> {
    let mut objects = Vec::with_capacity(regions.len());

    for region in regions {
        if !region.is_rectangle() {
            continue;
        }

        let corners = Corners::try_from(region.points.as_slice())?;
        let bndbox = corners.to_rectangle(width, height);
        if bndbox.is_inverted() {
            warn!(
                "Two-corner box {:?} is not ordered top-left/bottom-right, keeping it as given",
                bndbox
            );
        }

        for label in region.label.iter() {
            objects.push(VocObject {
                name: config.label_rewrites.apply(label).to_string(),
                bndbox,
            });
        }
    }

    Ok(objects)
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &str,
) -> Result<(), ImportError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_annotation_xml<W: Write>(
    writer: &mut Writer<W>,
    annotation: &VocAnnotation,
) -> Result<(), ImportError> {
    writer.write_event(Event::Start(BytesStart::new("annotation")))?;
    write_element(writer, "folder", &annotation.folder)?;
    write_element(writer, "filename", &annotation.filename)?;
    write_element(writer, "path", &annotation.path)?;

    writer.write_event(Event::Start(BytesStart::new("source")))?;
    write_element(writer, "database", "Unknown")?;
    writer.write_event(Event::End(BytesEnd::new("source")))?;

    writer.write_event(Event::Start(BytesStart::new("size")))?;
    write_element(writer, "width", &annotation.width.to_string())?;
    write_element(writer, "height", &annotation.height.to_string())?;
    write_element(writer, "depth", UNSPECIFIED)?;
    writer.write_event(Event::End(BytesEnd::new("size")))?;

    write_element(writer, "segmented", UNSPECIFIED)?;

    for object in &annotation.objects {
        writer.write_event(Event::Start(BytesStart::new("object")))?;
        write_element(writer, "name", &object.name)?;
        write_element(writer, "pose", UNSPECIFIED)?;
        write_element(writer, "truncated", UNSPECIFIED)?;
        write_element(writer, "difficult", UNSPECIFIED)?;
        write_element(writer, "occluded", UNSPECIFIED)?;

        let bndbox = &object.bndbox;
        writer.write_event(Event::Start(BytesStart::new("bndbox")))?;
        write_element(writer, "xmin", &bndbox.xmin.to_string())?;
        write_element(writer, "xmax", &bndbox.xmax.to_string())?;
        write_element(writer, "ymin", &bndbox.ymin.to_string())?;
        write_element(writer, "ymax", &bndbox.ymax.to_string())?;
        writer.write_event(Event::End(BytesEnd::new("bndbox")))?;

        writer.write_event(Event::End(BytesEnd::new("object")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("annotation")))?;
    Ok(())
}

/// Serialize an annotation into the Pascal VOC XML template.
pub fn to_voc_xml(annotation: &VocAnnotation) -> Result<String, ImportError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
    write_annotation_xml(&mut writer, annotation)?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// Write `<filename>.xml` into the annotation directory.
pub fn write_annotation(annotation: &VocAnnotation, xml_out_dir: &Path) -> Result<(), ImportError> {
    let xml_path = xml_out_dir.join(format!("{}.xml", annotation.filename));
    let mut file = BufWriter::new(File::create(&xml_path)?);
    file.write_all(to_voc_xml(annotation)?.as_bytes())?;
    file.flush()?;
    Ok(())
}

/// Convert one line of a Dataturks export into a Pascal VOC annotation file.
pub fn convert_item(
    line: &str,
    config: &ImporterConfig,
    fetcher: &dyn ImageFetcher,
) -> Result<ItemOutcome, ImportError> {
    let item: LabeledItem = serde_json::from_str(line)?;
    if item.is_skipped() {
        info!("Ignoring skipped item");
        return Ok(ItemOutcome::Skipped);
    }
    let regions: Vec<&Region> = item.regions().collect();

    let file_path = maybe_download(&item.content, &config.image_dir, fetcher)?;
    let (width, height) = image_dimensions(&file_path)?;
    let export_size = regions
        .first()
        .and_then(|first| first.image_width.zip(first.image_height));
    if let Some((w, h)) = export_size {
        if (w, h) != (width, height) {
            debug!(
                "Export size {}x{} differs from image size {}x{} for {}",
                w,
                h,
                width,
                height,
                file_path.display()
            );
        }
    }

    let annotation = VocAnnotation {
        folder: config.folder_name(),
        filename: file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: file_path.to_string_lossy().into_owned(),
        width,
        height,
        objects: region_objects(&regions, config, width, height)?,
    };

    write_annotation(&annotation, &config.annotation_dir)?;
    Ok(ItemOutcome::Converted(annotation))
}

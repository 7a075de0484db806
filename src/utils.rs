use image::ImageReader;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use crate::error::ImportError;

/// Local file name for an image URL or path: its last `/`-separated segment.
pub fn file_name_from_content(content: &str) -> String {
    let segment = content.rsplit('/').next().unwrap_or(content);
    sanitize_filename::sanitize(segment)
}

/// Image id used in the split manifests: the file name without `.jpg`.
pub fn image_id(file_name: &str) -> &str {
    file_name.strip_suffix(".jpg").unwrap_or(file_name)
}

/// Read the true pixel size of an image, sniffing the format from its bytes.
pub fn image_dimensions(path: &Path) -> Result<(u32, u32), ImportError> {
    let to_error = |source| ImportError::Image {
        path: path.to_path_buf(),
        source,
    };
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| to_error(image::ImageError::IoError(e)))?
        .into_dimensions()
        .map_err(to_error)
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_file_name_from_content() {
        assert_eq!(
            file_name_from_content("http://cdn.example.com/uploads/img_01.jpg"),
            "img_01.jpg"
        );
        assert_eq!(file_name_from_content("local/dir/b.png"), "b.png");
        assert_eq!(file_name_from_content("c.jpg"), "c.jpg");
    }

    #[test]
    fn test_image_id() {
        assert_eq!(image_id("a.jpg"), "a");
        assert_eq!(image_id("a.png"), "a.png");
    }

    #[test]
    fn test_image_dimensions_ignores_extension() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("img.png");
        RgbImage::new(7, 3).save(&png).unwrap();
        let renamed = dir.path().join("img_without_extension");
        std::fs::rename(&png, &renamed).unwrap();

        assert_eq!(image_dimensions(&renamed).unwrap(), (7, 3));
    }

    #[test]
    fn test_image_dimensions_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        assert!(matches!(
            image_dimensions(&path),
            Err(ImportError::Image { .. })
        ));
    }
}

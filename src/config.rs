use clap::Parser;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const IMAGES_DIR: &str = "JPEGImages";
pub const ANNOTATIONS_DIR: &str = "Annotations";
pub const IMAGE_SETS_DIR: &str = "ImageSets/Main";

// Size variants of the same product collapse into one class
pub const LABEL_REWRITES: &[(&str, &str)] = &[
    ("Курвуазье VSOP 0.7", "Курвуазье VSOP"),
    ("Курвуазье VSOP 0.5", "Курвуазье VSOP"),
    ("Джим Бим 0.5", "Джим Бим"),
    ("Джим Бим 1", "Джим Бим"),
    ("Курвуазье VS 0.7", "Курвуазье VS"),
    ("Курвуазье VS 0.5", "Курвуазье VS"),
];

/// Class names in class-id order.
pub const DEFAULT_CLASSES: &[&str] = &[
    "Джим Бим",
    "Джим Бим Apple",
    "Джим Бим Черри",
    "Курвуазье VS",
    "Курвуазье VSOP",
    "Сауза Голд",
    "Сауза Сильвер",
];

pub fn default_sets() -> Vec<ImageSet> {
    vec![
        ImageSet::new("2007", "trainval"),
        ImageSet::new("2007", "test"),
    ]
}

pub fn default_classes() -> Vec<String> {
    DEFAULT_CLASSES.iter().map(|class| class.to_string()).collect()
}

/// Command-line arguments for converting a Dataturks export to Pascal VOC.
#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about = "Converts Dataturks output JSON file for Image bounding box to Pascal VOC format.",
    long_about = None
)]
pub struct ImportArgs {
    /// Path to the JSON file downloaded from Dataturks
    #[arg(value_name = "dataturks_JSON_FilePath")]
    pub dataturks_json_file_path: PathBuf,

    /// Directory where images and annotations will be stored
    #[arg(value_name = "pascal_voc_dir")]
    pub pascal_voc_dir: PathBuf,

    /// Fraction of the dataset taken for the test split
    #[arg(value_name = "test_percent", value_parser = validate_size)]
    pub test_percent: f64,
}

/// Command-line arguments for flattening Pascal VOC annotations into index files.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct FlattenArgs {
    /// Root of the VOC devkit containing VOC<year> directories
    #[arg(long = "devkit-dir", default_value = "VOCdevkit")]
    pub devkit_dir: PathBuf,

    /// Directory receiving the <year>_<split>.txt files
    #[arg(long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// Image sets to flatten, as YEAR:SPLIT
    #[arg(long = "set", default_values_t = default_sets())]
    pub sets: Vec<ImageSet>,

    /// Ordered class list; the position of a name is its class id
    #[arg(long = "classes", use_value_delimiter = true, default_values_t = default_classes())]
    pub classes: Vec<String>,
}

// Validate that the size is between 0.0 and 1.0
pub fn validate_size(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}

/// A `(year, split)` pair such as `2007:trainval`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSet {
    pub year: String,
    pub split: String,
}

impl ImageSet {
    pub fn new(year: impl Into<String>, split: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            split: split.into(),
        }
    }
}

impl FromStr for ImageSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((year, split)) if !year.is_empty() && !split.is_empty() => {
                Ok(ImageSet::new(year, split))
            }
            _ => Err(format!("expected YEAR:SPLIT, got `{}`", s)),
        }
    }
}

impl fmt::Display for ImageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.year, self.split)
    }
}

/// Raw label to canonical label mapping.
#[derive(Debug, Clone, Default)]
pub struct LabelRewrites(HashMap<String, String>);

impl LabelRewrites {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(raw, canonical)| (raw.into(), canonical.into()))
                .collect(),
        )
    }

    pub fn apply<'a>(&'a self, label: &'a str) -> &'a str {
        self.0.get(label).map_or(label, String::as_str)
    }
}

/// Paths and settings shared by every importer operation.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    pub export_path: PathBuf,
    pub image_dir: PathBuf,
    pub annotation_dir: PathBuf,
    pub image_sets_dir: PathBuf,
    pub test_percent: f64,
    pub label_rewrites: LabelRewrites,
}

impl ImporterConfig {
    pub fn new(
        export_path: impl Into<PathBuf>,
        pascal_voc_dir: impl AsRef<Path>,
        test_percent: f64,
    ) -> Self {
        let pascal_voc_dir = pascal_voc_dir.as_ref();
        Self {
            export_path: export_path.into(),
            image_dir: pascal_voc_dir.join(IMAGES_DIR),
            annotation_dir: pascal_voc_dir.join(ANNOTATIONS_DIR),
            image_sets_dir: pascal_voc_dir.join(IMAGE_SETS_DIR),
            test_percent,
            label_rewrites: LabelRewrites::new(LABEL_REWRITES.iter().copied()),
        }
    }

    pub fn from_args(args: &ImportArgs) -> Self {
        Self::new(
            &args.dataturks_json_file_path,
            &args.pascal_voc_dir,
            args.test_percent,
        )
    }

    /// Name written into the `<folder>` element.
    pub fn folder_name(&self) -> String {
        self.image_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Layout and class list used by the flattener.
#[derive(Debug, Clone)]
pub struct FlattenerConfig {
    /// Absolute path of the devkit root.
    pub devkit_dir: PathBuf,
    pub output_dir: PathBuf,
    pub sets: Vec<ImageSet>,
    pub classes: Vec<String>,
}

impl FlattenerConfig {
    pub fn from_args(args: &FlattenArgs) -> std::io::Result<Self> {
        let devkit_dir = if args.devkit_dir.is_absolute() {
            args.devkit_dir.clone()
        } else {
            std::env::current_dir()?.join(&args.devkit_dir)
        };
        Ok(Self {
            devkit_dir,
            output_dir: args.output_dir.clone(),
            sets: args.sets.clone(),
            classes: args.classes.clone(),
        })
    }

    pub fn voc_dir(&self, year: &str) -> PathBuf {
        self.devkit_dir.join(format!("VOC{}", year))
    }

    pub fn class_id(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|class| class == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_size() {
        assert!(validate_size("0.5").is_ok());
        assert!(validate_size("1.0").is_ok());
        assert!(validate_size("0.0").is_ok());
        assert!(validate_size("-0.1").is_err());
        assert!(validate_size("1.1").is_err());
        assert!(validate_size("abc").is_err());
    }

    #[test]
    fn test_import_args_positional() {
        let args = ImportArgs::parse_from(["dataturks2voc", "export.json", "out", "0.2"]);
        let config = ImporterConfig::from_args(&args);
        assert_eq!(config.image_dir, Path::new("out/JPEGImages"));
        assert_eq!(config.annotation_dir, Path::new("out/Annotations"));
        assert_eq!(config.image_sets_dir, Path::new("out/ImageSets/Main"));
        assert_eq!(config.folder_name(), "JPEGImages");
        assert_eq!(config.test_percent, 0.2);
    }

    #[test]
    fn test_flatten_args_defaults() {
        let args = FlattenArgs::parse_from(["voc2index"]);
        assert_eq!(args.sets, default_sets());
        assert_eq!(args.classes, default_classes());
        let config = FlattenerConfig::from_args(&args).unwrap();
        assert!(config.devkit_dir.is_absolute());
        assert_eq!(config.class_id("Курвуазье VSOP"), Some(4));
        assert_eq!(config.class_id("unknown"), None);
    }

    #[test]
    fn test_label_rewrites() {
        let rewrites = LabelRewrites::new(LABEL_REWRITES.iter().copied());
        assert_eq!(rewrites.apply("Джим Бим 0.5"), "Джим Бим");
        assert_eq!(rewrites.apply("Сауза Голд"), "Сауза Голд");
    }

    #[test]
    fn test_image_set_parse() {
        assert_eq!(
            "2012:val".parse::<ImageSet>(),
            Ok(ImageSet::new("2012", "val"))
        );
        assert!("2012".parse::<ImageSet>().is_err());
    }
}

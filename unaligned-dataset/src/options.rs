use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::Domain;
use crate::error::DatasetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum Direction {
    #[serde(rename = "AtoB")]
    #[strum(serialize = "AtoB")]
    AToB,
    #[serde(rename = "BtoA")]
    #[strum(serialize = "BtoA")]
    BToA,
}

/// How images are brought to a fixed size before they become tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Preprocess {
    ResizeAndCrop,
    Crop,
    ScaleWidth,
    ScaleWidthAndCrop,
    None,
}

impl Preprocess {
    pub fn resizes(self) -> bool {
        matches!(self, Preprocess::ResizeAndCrop)
    }

    pub fn scales_width(self) -> bool {
        matches!(self, Preprocess::ScaleWidth | Preprocess::ScaleWidthAndCrop)
    }

    pub fn crops(self) -> bool {
        matches!(
            self,
            Preprocess::ResizeAndCrop | Preprocess::Crop | Preprocess::ScaleWidthAndCrop
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetOptions {
    pub dataroot: PathBuf,
    pub phase: String,
    pub direction: Direction,
    pub input_nc: u32,
    pub output_nc: u32,
    pub serial_batches: bool,
    // None means every discovered image is kept
    pub max_dataset_size: Option<usize>,
    pub preprocess: Preprocess,
    pub load_size: u32,
    pub crop_size: u32,
    pub no_flip: bool,
    pub seed: Option<u64>,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            dataroot: PathBuf::from("."),
            phase: "train".to_string(),
            direction: Direction::AToB,
            input_nc: 3,
            output_nc: 3,
            serial_batches: false,
            max_dataset_size: None,
            preprocess: Preprocess::ResizeAndCrop,
            load_size: 286,
            crop_size: 256,
            no_flip: false,
            seed: None,
        }
    }
}

impl DatasetOptions {
    pub fn new(dataroot: impl Into<PathBuf>) -> Self {
        Self {
            dataroot: dataroot.into(),
            ..Self::default()
        }
    }

    /// Read options from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse options file {}", path.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write options file {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> {
            Err(DatasetError::InvalidOptions(msg.to_string()).into())
        };

        if self.phase.is_empty() {
            return invalid("phase must not be empty");
        }
        if self.input_nc == 0 || self.output_nc == 0 {
            return invalid("channel counts must be positive");
        }
        if self.load_size == 0 || self.crop_size == 0 {
            return invalid("load_size and crop_size must be positive");
        }

        Ok(())
    }

    /// Channel counts as seen by the model, `(input_nc, output_nc)`.
    pub fn effective_channels(&self) -> (u32, u32) {
        match self.direction {
            Direction::AToB => (self.input_nc, self.output_nc),
            Direction::BToA => (self.output_nc, self.input_nc),
        }
    }

    pub fn domain_dir(&self, domain: Domain) -> PathBuf {
        self.dataroot.join(domain.dir_name(&self.phase))
    }
}

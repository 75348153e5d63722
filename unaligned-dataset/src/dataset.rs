use anyhow::{Context, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::path::{Path, PathBuf};

use crate::domain::Domain;
use crate::error::DatasetError;
use crate::folder;
use crate::image::{self, ImageTensor};
use crate::options::DatasetOptions;

/// Random-access view over training samples, shared across loader workers.
pub trait Dataset: Send + Sync {
    type Item;

    fn name(&self) -> &'static str;

    /// Number of samples in one epoch.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the sample at `index`. Implementations may accept indices past
    /// `len()` and wrap them.
    fn get(&self, index: usize) -> Result<Self::Item>;
}

/// One sample: an image from each domain plus the files they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub a: ImageTensor,
    pub b: ImageTensor,
    pub c: ImageTensor,
    pub a_path: PathBuf,
    pub b_path: PathBuf,
    pub c_path: PathBuf,
}

/// Three unpaired image collections read from `<dataroot>/<phase>A`,
/// `<phase>B` and `<phase>C`.
///
/// Domain A is walked in order; B and C are either aligned with A by index
/// (`serial_batches`) or drawn at random on every lookup so the model never
/// sees a fixed A/B/C pairing. Images are decoded lazily in [`get`].
///
/// [`get`]: UnalignedDataset::get
#[derive(Debug)]
pub struct UnalignedDataset {
    options: DatasetOptions,
    dirs: [PathBuf; 3],
    paths: [Vec<PathBuf>; 3],
    input_nc: u32,
    output_nc: u32,
    rng: Mutex<StdRng>,
}

impl UnalignedDataset {
    /// Scan the three domain directories. Uses `options.seed` for the
    /// random pairing when set, OS entropy otherwise.
    pub fn new(options: DatasetOptions) -> Result<Self> {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(options, rng)
    }

    #[tracing::instrument(skip_all, fields(dataroot = %options.dataroot.display(), phase = %options.phase))]
    pub fn with_rng(options: DatasetOptions, rng: StdRng) -> Result<Self> {
        options.validate()?;

        let root = &options.dataroot;
        if !root.exists() {
            return Err(DatasetError::MissingDirectory(root.clone()).into());
        }
        if !root.is_dir() {
            return Err(DatasetError::NotADirectory(root.clone()).into());
        }

        let dirs = [Domain::A, Domain::B, Domain::C].map(|domain| options.domain_dir(domain));

        let mut paths: [Vec<PathBuf>; 3] = Default::default();
        for domain in Domain::iter() {
            let dir = &dirs[domain.index()];
            let found = folder::list_images(dir, options.max_dataset_size)
                .with_context(|| format!("Failed to scan domain {domain}"))?;

            if found.is_empty() {
                log::warn!("No images found in domain {domain} ({})", dir.display());
            }
            paths[domain.index()] = found;
        }

        let (input_nc, output_nc) = options.effective_channels();

        log::info!(
            "Loaded unaligned dataset from {}: A={}, B={}, C={}",
            root.display(),
            paths[0].len(),
            paths[1].len(),
            paths[2].len()
        );

        Ok(Self {
            options,
            dirs,
            paths,
            input_nc,
            output_nc,
            rng: Mutex::new(rng),
        })
    }

    pub fn options(&self) -> &DatasetOptions {
        &self.options
    }

    pub fn size(&self, domain: Domain) -> usize {
        self.paths[domain.index()].len()
    }

    pub fn paths(&self, domain: Domain) -> &[PathBuf] {
        &self.paths[domain.index()]
    }

    pub fn input_nc(&self) -> u32 {
        self.input_nc
    }

    pub fn output_nc(&self) -> u32 {
        self.output_nc
    }

    /// Channel count that decides whether images of `domain` are loaded as
    /// grayscale. A is the input side; B and C are both output side.
    pub fn channels(&self, domain: Domain) -> u32 {
        match domain {
            Domain::A => self.input_nc,
            Domain::B | Domain::C => self.output_nc,
        }
    }

    /// Map a sample index to a path index in each domain.
    pub fn resolve_indices<R: Rng>(&self, index: usize, rng: &mut R) -> Result<[usize; 3]> {
        if let Some(domain) = Domain::iter().find(|&d| self.size(d) == 0) {
            return Err(DatasetError::EmptyDomain {
                domain,
                dir: self.dirs[domain.index()].clone(),
            }
            .into());
        }

        let index_a = index % self.size(Domain::A);
        let (index_b, index_c) = if self.options.serial_batches {
            (index % self.size(Domain::B), index % self.size(Domain::C))
        } else {
            (
                rng.random_range(0..self.size(Domain::B)),
                rng.random_range(0..self.size(Domain::C)),
            )
        };

        Ok([index_a, index_b, index_c])
    }

    /// Like [`Dataset::get`], drawing from a caller-owned generator instead
    /// of the dataset's own.
    pub fn get_with_rng<R: Rng>(&self, index: usize, rng: &mut R) -> Result<DataPoint> {
        let indices = self.resolve_indices(index, rng)?;
        let [a_path, b_path, c_path] = [Domain::A, Domain::B, Domain::C]
            .map(|d| self.paths[d.index()][indices[d.index()]].clone());

        log::trace!("index {index} resolved to {indices:?}");

        let a = self.load(&a_path, Domain::A, rng)?;
        let b = self.load(&b_path, Domain::B, rng)?;
        let c = self.load(&c_path, Domain::C, rng)?;

        Ok(DataPoint {
            a,
            b,
            c,
            a_path,
            b_path,
            c_path,
        })
    }

    fn load<R: Rng>(&self, path: &Path, domain: Domain, rng: &mut R) -> Result<ImageTensor> {
        let grayscale = self.channels(domain) == 1;
        image::load_and_transform(path, &self.options, grayscale, rng)
    }
}

impl Dataset for UnalignedDataset {
    type Item = DataPoint;

    fn name(&self) -> &'static str {
        "unaligned"
    }

    fn len(&self) -> usize {
        Domain::iter().map(|d| self.size(d)).max().unwrap_or(0)
    }

    fn get(&self, index: usize) -> Result<DataPoint> {
        // Fork so decoding never happens while the shared generator is locked
        let mut rng = StdRng::from_rng(&mut *self.rng.lock());
        self.get_with_rng(index, &mut rng)
    }
}

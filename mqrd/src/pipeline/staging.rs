//! Scoped storage for image variants while they wait for the detector.
//!
//! [`VariantStaging::materialize`] hands back a [`StagedVariant`] that owns whatever backs the
//! variant. In `disk` mode that is a PNG in a [`NamedTempFile`], which is unlinked when the handle
//! drops, so a file is released on every exit path of the processor including unwinding.

use std::borrow::Cow;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageFormat};
use tempfile::NamedTempFile;
use tracing::trace;

use super::DecodeError;
use super::variants::{ImageVariant, VariantKind};
use crate::config::{StagingConfig, StagingMode};

#[derive(Debug, Clone, Default)]
pub enum VariantStaging {
    #[default]
    Memory,
    Disk {
        /// Directory for temp files; the system temp dir when unset
        directory: Option<PathBuf>,
    },
}

impl VariantStaging {
    pub fn from_config(config: &StagingConfig) -> Self {
        match config.mode {
            StagingMode::Memory => VariantStaging::Memory,
            StagingMode::Disk => VariantStaging::Disk {
                directory: config.directory.clone(),
            },
        }
    }

    pub fn materialize(&self, variant: ImageVariant) -> Result<StagedVariant, DecodeError> {
        let storage = match self {
            VariantStaging::Memory => Storage::Memory(variant.image),
            VariantStaging::Disk { directory } => Storage::Disk(spill(&variant.image, directory.as_deref())?),
        };

        Ok(StagedVariant {
            kind: variant.kind,
            storage,
        })
    }
}

fn staging_error(e: impl std::fmt::Display) -> DecodeError {
    DecodeError::Staging { message: e.to_string() }
}

fn spill(image: &GrayImage, directory: Option<&Path>) -> Result<NamedTempFile, DecodeError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("mqrd-variant-").suffix(".png");
    let mut file = match directory {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(staging_error)?;

    {
        let mut writer = BufWriter::new(file.as_file_mut());
        image.write_to(&mut writer, ImageFormat::Png).map_err(staging_error)?;
        writer.flush().map_err(staging_error)?;
    }

    trace!(path = %file.path().display(), "Variant spilled to disk");
    Ok(file)
}

#[derive(Debug)]
enum Storage {
    Memory(GrayImage),
    Disk(NamedTempFile),
}

/// Handle to a staged variant. Dropping it releases the backing storage.
#[derive(Debug)]
pub struct StagedVariant {
    kind: VariantKind,
    storage: Storage,
}

impl StagedVariant {
    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    /// Backing file, if the variant lives on disk.
    pub fn path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::Memory(_) => None,
            Storage::Disk(file) => Some(file.path()),
        }
    }

    pub fn load(&self) -> Result<Cow<'_, GrayImage>, DecodeError> {
        match &self.storage {
            Storage::Memory(image) => Ok(Cow::Borrowed(image)),
            Storage::Disk(file) => {
                let image = image::open(file.path()).map_err(staging_error)?;
                Ok(Cow::Owned(image.to_luma8()))
            }
        }
    }
}

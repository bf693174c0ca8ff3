/// Volumetric file I/O with format selection by file extension
mod component;
mod metaimage;
mod nrrd;

pub use component::{ComponentType, StorableSample, decode_samples, encode_samples};
pub use metaimage::MetaImageFormat;
pub use nrrd::NrrdFormat;

use crate::error::{FractureError, Result};
use crate::sample::Sample;
use crate::volume::{Geometry, VolumeGrid};
use std::path::Path;

/// Decoded file contents before conversion to a sample type.
pub struct RawVolume {
    pub geometry: Geometry,
    pub component: ComponentType,
    pub big_endian: bool,
    /// Uncompressed sample bytes.
    pub bytes: Vec<u8>,
}

/// A volume ready to be written: little-endian bytes of `component`.
pub struct EncodedVolume<'a> {
    pub geometry: &'a Geometry,
    pub component: ComponentType,
    pub bytes: Vec<u8>,
}

/// One on-disk volume format. Each format handles its own header and
/// compression; sample conversion is shared.
pub trait VolumeFormat: Send + Sync {
    /// File extensions without the dot, e.g. "nrrd".
    fn supported_extensions(&self) -> Vec<&'static str>;

    fn supports(&self, extension: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// Name used in logs and error messages.
    fn name(&self) -> &'static str;

    fn read(&self, path: &Path) -> Result<RawVolume>;

    fn write(&self, path: &Path, volume: &EncodedVolume<'_>) -> Result<()>;
}

/// Registry of every available format.
pub struct FormatRegistry {
    formats: Vec<Box<dyn VolumeFormat>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self {
            formats: vec![Box::new(NrrdFormat), Box::new(MetaImageFormat)],
        }
    }

    pub fn find_format(&self, extension: &str) -> Option<&dyn VolumeFormat> {
        self.formats
            .iter()
            .find(|format| format.supports(extension))
            .map(|f| f.as_ref())
    }

    /// Look up the format for `path`, failing with the list of known extensions.
    pub fn find_format_for_file(&self, path: &Path) -> Result<&dyn VolumeFormat> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        self.find_format(extension)
            .ok_or_else(|| FractureError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: extension.to_string(),
                supported: self.supported_extensions().join(", "),
            })
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self
            .formats
            .iter()
            .flat_map(|f| f.supported_extensions())
            .map(|s| s.to_lowercase())
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }

    /// Read a volume and convert its samples into `T`.
    pub fn read<T: Sample>(&self, path: &Path) -> Result<VolumeGrid<T>> {
        let format = self.find_format_for_file(path)?;
        let raw = format.read(path)?;
        let count = raw.geometry.voxel_count();
        let data = decode_samples(&raw.bytes, raw.component, raw.big_endian, count).ok_or_else(
            || FractureError::Format {
                format: format.name(),
                path: path.to_path_buf(),
                message: format!(
                    "expected {} bytes of {:?} data, found {}",
                    count.saturating_mul(raw.component.size()),
                    raw.component,
                    raw.bytes.len()
                ),
            },
        )?;
        log::info!(
            "Read {} ({}, {:?} {:?})",
            path.display(),
            format.name(),
            raw.component,
            raw.geometry.size()
        );
        VolumeGrid::new(raw.geometry, data)
    }

    pub fn write<T: StorableSample>(&self, volume: &VolumeGrid<T>, path: &Path) -> Result<()> {
        let format = self.find_format_for_file(path)?;
        let encoded = EncodedVolume {
            geometry: volume.geometry(),
            component: T::COMPONENT,
            bytes: encode_samples(volume.data())?,
        };
        format.write(path, &encoded)?;
        log::info!("Saved {} ({})", path.display(), format.name());
        Ok(())
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read `path` with the default registry.
pub fn read_volume<T: Sample>(path: &Path) -> Result<VolumeGrid<T>> {
    FormatRegistry::new().read(path)
}

/// Write `volume` to `path` with the default registry.
pub fn write_volume<T: StorableSample>(volume: &VolumeGrid<T>, path: &Path) -> Result<()> {
    FormatRegistry::new().write(volume, path)
}

/// Split a text header off the front of a file. Lines are yielded until
/// `is_last` accepts one (inclusive) or an empty line is met (exclusive);
/// the returned offset is where the binary payload starts.
pub(crate) fn split_header<'a>(
    bytes: &'a [u8],
    mut is_last: impl FnMut(&str) -> bool,
) -> Option<(Vec<&'a str>, usize)> {
    let mut lines = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let end = bytes[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| pos + p)
            .unwrap_or(bytes.len());
        let line = std::str::from_utf8(&bytes[pos..end]).ok()?;
        let line = line.strip_suffix('\r').unwrap_or(line);
        pos = (end + 1).min(bytes.len());
        if line.is_empty() {
            return Some((lines, pos));
        }
        let last = is_last(line);
        lines.push(line);
        if last {
            return Some((lines, pos));
        }
    }
    None
}

/// Parse whitespace-separated floats, requiring exactly `N` of them.
pub(crate) fn parse_floats<const N: usize>(value: &str) -> Option<[f64; N]> {
    let parsed: Vec<f64> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    parsed.try_into().ok()
}

/// Parse exactly three whitespace-separated voxel counts.
pub(crate) fn parse_sizes(value: &str) -> Option<[usize; 3]> {
    let sizes: Vec<usize> = value
        .split_whitespace()
        .map(|s| s.parse().ok())
        .collect::<Option<_>>()?;
    sizes.try_into().ok()
}

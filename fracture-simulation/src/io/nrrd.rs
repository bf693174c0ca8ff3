/// NRRD reader and writer (attached data, raw or gzip encoding)
use super::{ComponentType, EncodedVolume, RawVolume, VolumeFormat, parse_sizes, split_header};
use crate::error::{FractureError, Result};
use crate::volume::Geometry;
use constants::coordinate_system::{LPS_SPACE_NAMES, RAS_SPACE_NAMES, RAS_TO_LPS};
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use nalgebra::{Matrix3, Point3, Vector3};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

pub struct NrrdFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Raw,
    Gzip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Space {
    Lps,
    Ras,
}

#[derive(Default)]
struct Header {
    component: Option<ComponentType>,
    dimension: Option<usize>,
    sizes: Option<[usize; 3]>,
    encoding: Option<Encoding>,
    big_endian: bool,
    space: Option<Space>,
    directions: Option<[Vector3<f64>; 3]>,
    origin: Option<Vector3<f64>>,
    spacings: Option<[f64; 3]>,
}

fn parse_component(value: &str) -> Option<ComponentType> {
    let component = match value.trim().to_ascii_lowercase().as_str() {
        "signed char" | "int8" | "int8_t" => ComponentType::Int8,
        "uchar" | "unsigned char" | "uint8" | "uint8_t" => ComponentType::UInt8,
        "short" | "short int" | "signed short" | "signed short int" | "int16" | "int16_t" => {
            ComponentType::Int16
        }
        "ushort" | "unsigned short" | "unsigned short int" | "uint16" | "uint16_t" => {
            ComponentType::UInt16
        }
        "int" | "signed int" | "int32" | "int32_t" => ComponentType::Int32,
        "uint" | "unsigned int" | "uint32" | "uint32_t" => ComponentType::UInt32,
        "float" => ComponentType::Float32,
        "double" => ComponentType::Float64,
        _ => return None,
    };
    Some(component)
}

fn component_name(component: ComponentType) -> &'static str {
    match component {
        ComponentType::Int8 => "int8",
        ComponentType::UInt8 => "uint8",
        ComponentType::Int16 => "short",
        ComponentType::UInt16 => "ushort",
        ComponentType::Int32 => "int",
        ComponentType::UInt32 => "uint",
        ComponentType::Float32 => "float",
        ComponentType::Float64 => "double",
    }
}

/// Parse `(x,y,z) (x,y,z) (x,y,z)`.
fn parse_vectors(value: &str) -> Option<Vec<Vector3<f64>>> {
    value
        .split(')')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let inner = part.strip_prefix('(')?;
            super::parse_floats::<3>(inner).map(Vector3::from)
        })
        .collect()
}

impl Header {
    fn apply(&mut self, key: &str, value: &str) -> std::result::Result<(), String> {
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "type" => {
                self.component =
                    Some(parse_component(value).ok_or(format!("unsupported type '{value}'"))?);
            }
            "dimension" => {
                self.dimension = Some(value.parse().map_err(|_| format!("bad dimension '{value}'"))?);
            }
            "sizes" => {
                self.sizes = Some(parse_sizes(value).ok_or(format!("bad sizes '{value}'"))?);
            }
            "encoding" => {
                self.encoding = Some(match value.to_ascii_lowercase().as_str() {
                    "raw" => Encoding::Raw,
                    "gzip" | "gz" => Encoding::Gzip,
                    other => return Err(format!("unsupported encoding '{other}'")),
                });
            }
            "endian" => {
                self.big_endian = match value.to_ascii_lowercase().as_str() {
                    "big" => true,
                    "little" => false,
                    other => return Err(format!("unknown endian '{other}'")),
                };
            }
            "space" => {
                let name = value.to_ascii_lowercase();
                self.space = if RAS_SPACE_NAMES.contains(&name.as_str()) {
                    Some(Space::Ras)
                } else if LPS_SPACE_NAMES.contains(&name.as_str())
                    || name == "scanner-xyz"
                {
                    Some(Space::Lps)
                } else {
                    return Err(format!("unsupported space '{value}'"));
                };
            }
            "space dimension" => {
                if value != "3" {
                    return Err(format!("space dimension must be 3, got {value}"));
                }
                self.space.get_or_insert(Space::Lps);
            }
            "space directions" => {
                let vectors = parse_vectors(value)
                    .and_then(|v| <[Vector3<f64>; 3]>::try_from(v).ok())
                    .ok_or(format!("bad space directions '{value}'"))?;
                self.directions = Some(vectors);
            }
            "space origin" => {
                let origin = parse_vectors(value)
                    .filter(|v| v.len() == 1)
                    .map(|v| v[0])
                    .ok_or(format!("bad space origin '{value}'"))?;
                self.origin = Some(origin);
            }
            "spacings" => {
                self.spacings =
                    Some(super::parse_floats::<3>(value).ok_or(format!("bad spacings '{value}'"))?);
            }
            "data file" | "datafile" => return Err("detached data files are not supported".into()),
            "byte skip" | "line skip" => {
                if value != "0" {
                    return Err(format!("{key} is not supported"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn geometry(&self) -> std::result::Result<Geometry, String> {
        if self.dimension != Some(3) {
            return Err(format!("dimension must be 3, got {:?}", self.dimension));
        }
        let size = self.sizes.ok_or("missing sizes")?;

        let (spacing, mut direction) = match (self.directions, self.spacings) {
            (Some(vectors), _) => {
                let mut spacing = Vector3::zeros();
                let mut direction = Matrix3::zeros();
                for (axis, v) in vectors.iter().enumerate() {
                    let norm = v.norm();
                    if norm == 0.0 {
                        return Err(format!("space direction {axis} has zero length"));
                    }
                    spacing[axis] = norm;
                    direction.set_column(axis, &(v / norm));
                }
                (spacing, direction)
            }
            (None, Some(spacings)) => (Vector3::from(spacings), Matrix3::identity()),
            (None, None) => (Vector3::repeat(1.0), Matrix3::identity()),
        };
        let mut origin = self.origin.unwrap_or_else(Vector3::zeros);

        if self.space == Some(Space::Ras) {
            let flip = Matrix3::from_diagonal(&Vector3::from(RAS_TO_LPS));
            origin = flip * origin;
            direction = flip * direction;
        }

        Geometry::new(size, spacing, Point3::from(origin), direction).map_err(|e| e.to_string())
    }
}

fn format_vector(v: &Vector3<f64>) -> String {
    format!("({},{},{})", v.x, v.y, v.z)
}

impl VolumeFormat for NrrdFormat {
    fn supported_extensions(&self) -> Vec<&'static str> {
        vec!["nrrd"]
    }

    fn name(&self) -> &'static str {
        "NRRD"
    }

    fn read(&self, path: &Path) -> Result<RawVolume> {
        let malformed = |message: String| FractureError::Format {
            format: "NRRD",
            path: path.to_path_buf(),
            message,
        };

        let bytes = fs::read(path)?;
        if !bytes.starts_with(b"NRRD000") {
            return Err(malformed("missing NRRD magic".to_string()));
        }
        let (lines, offset) =
            split_header(&bytes, |_| false).ok_or_else(|| malformed("unterminated header".into()))?;

        let mut header = Header::default();
        for line in lines.iter().skip(1) {
            if line.starts_with('#') {
                continue;
            }
            // Key/value pairs ("key:=value") carry no geometry.
            if line.contains(":=") {
                continue;
            }
            let (key, value) = line
                .split_once(": ")
                .ok_or_else(|| malformed(format!("bad header line '{line}'")))?;
            header.apply(key, value).map_err(malformed)?;
        }

        let geometry = header.geometry().map_err(malformed)?;
        let component = header.component.ok_or_else(|| malformed("missing type".into()))?;
        let payload = &bytes[offset..];
        let data = match header.encoding.ok_or_else(|| malformed("missing encoding".into()))? {
            Encoding::Raw => payload.to_vec(),
            Encoding::Gzip => {
                let mut decoded = Vec::new();
                MultiGzDecoder::new(payload)
                    .read_to_end(&mut decoded)
                    .map_err(|e| malformed(format!("gzip payload: {e}")))?;
                decoded
            }
        };

        Ok(RawVolume {
            geometry,
            component,
            big_endian: header.big_endian && component.size() > 1,
            bytes: data,
        })
    }

    fn write(&self, path: &Path, volume: &EncodedVolume<'_>) -> Result<()> {
        let geometry = volume.geometry;
        let [nx, ny, nz] = geometry.size();
        let axes = geometry.direction() * Matrix3::from_diagonal(geometry.spacing());

        let mut header = String::from("NRRD0004\n");
        header.push_str(&format!("type: {}\n", component_name(volume.component)));
        header.push_str("dimension: 3\n");
        header.push_str("space: left-posterior-superior\n");
        header.push_str(&format!("sizes: {nx} {ny} {nz}\n"));
        header.push_str(&format!(
            "space directions: {} {} {}\n",
            format_vector(&axes.column(0).into_owned()),
            format_vector(&axes.column(1).into_owned()),
            format_vector(&axes.column(2).into_owned()),
        ));
        header.push_str("kinds: domain domain domain\n");
        header.push_str("endian: little\n");
        header.push_str("encoding: gzip\n");
        header.push_str(&format!(
            "space origin: {}\n\n",
            format_vector(&geometry.origin().coords)
        ));

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&volume.bytes)?;
        let compressed = encoder.finish()?;

        let mut file = fs::File::create(path)?;
        file.write_all(header.as_bytes())?;
        file.write_all(&compressed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{read_volume, write_volume};
    use crate::volume::VolumeGrid;
    use approx::assert_relative_eq;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fracture-nrrd-{}-{name}", std::process::id()))
    }

    #[test]
    fn written_volume_reads_back() {
        let direction = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let geometry = Geometry::new(
            [4, 3, 2],
            Vector3::new(0.5, 0.25, 2.0),
            Point3::new(10.0, -3.5, 7.25),
            direction,
        )
        .unwrap();
        let data: Vec<i16> = (0..24).map(|i| i * 100 - 1000).collect();
        let volume = VolumeGrid::new(geometry, data).unwrap();

        let path = temp_path("roundtrip.nrrd");
        write_volume(&volume, &path).unwrap();
        let back: VolumeGrid<i16> = read_volume(&path).unwrap();
        fs::remove_file(&path).ok();

        assert!(back.geometry().is_consistent_with(volume.geometry(), 1e-9));
        assert_eq!(back.data(), volume.data());
    }

    #[test]
    fn ras_space_is_converted_to_lps() {
        let mut bytes = b"NRRD0004\n# comment\ntype: uchar\ndimension: 3\nspace: right-anterior-superior\n\
sizes: 2 1 1\nspace directions: (2,0,0) (0,3,0) (0,0,1)\nencoding: raw\n\
space origin: (1,2,3)\nowner:=someone\n\n"
            .to_vec();
        bytes.extend_from_slice(&[7, 9]);
        let path = temp_path("ras.nrrd");
        fs::write(&path, &bytes).unwrap();
        let volume: VolumeGrid<u8> = read_volume(&path).unwrap();
        fs::remove_file(&path).ok();

        let geometry = volume.geometry();
        assert_eq!(geometry.size(), [2, 1, 1]);
        assert_relative_eq!(geometry.spacing()[0], 2.0);
        assert_relative_eq!(geometry.spacing()[1], 3.0);
        assert_relative_eq!(geometry.origin().x, -1.0);
        assert_relative_eq!(geometry.origin().y, -2.0);
        assert_relative_eq!(geometry.origin().z, 3.0);
        assert_relative_eq!(geometry.direction()[(0, 0)], -1.0);
        assert_relative_eq!(geometry.direction()[(1, 1)], -1.0);
        let far = geometry.index_to_physical([1, 0, 0]);
        assert_relative_eq!(far.x, -3.0);
        assert_eq!(volume.data(), &[7, 9]);
    }

    #[test]
    fn big_endian_raw_samples_are_swapped() {
        let mut bytes = b"NRRD0005\ntype: short\ndimension: 3\nsizes: 2 1 1\nspacings: 1 1 1\n\
encoding: raw\nendian: big\n\n"
            .to_vec();
        bytes.extend_from_slice(&[0x01, 0x00, 0xFF, 0x38]);
        let path = temp_path("big.nrrd");
        fs::write(&path, &bytes).unwrap();
        let volume: VolumeGrid<i16> = read_volume(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(volume.data(), &[256, -200]);
    }

    #[test]
    fn rejects_unsupported_headers() {
        let cases: [&[u8]; 3] = [
            b"NRRD0004\ntype: short\ndimension: 2\nsizes: 2 2\nencoding: raw\n\n",
            b"NRRD0004\ntype: short\ndimension: 3\nsizes: 1 1 1\nencoding: raw\ndata file: x.raw\n\n",
            b"P5\n",
        ];
        for (i, bytes) in cases.iter().enumerate() {
            let path = temp_path(&format!("bad{i}.nrrd"));
            fs::write(&path, bytes).unwrap();
            let result: Result<VolumeGrid<i16>> = read_volume(&path);
            fs::remove_file(&path).ok();
            assert!(matches!(result, Err(FractureError::Format { .. })), "case {i}");
        }
    }

    #[test]
    fn oversized_gzip_header_is_a_format_error() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[0; 4]).unwrap();
        let payload = encoder.finish().unwrap();
        for (i, sizes) in ["4294967296 4294967296 2", "100000 100000 100"].iter().enumerate() {
            let mut bytes =
                format!("NRRD0004\ntype: uchar\ndimension: 3\nsizes: {sizes}\nencoding: gzip\n\n")
                    .into_bytes();
            bytes.extend_from_slice(&payload);
            let path = temp_path(&format!("huge{i}.nrrd"));
            fs::write(&path, &bytes).unwrap();
            let result: Result<VolumeGrid<u8>> = read_volume(&path);
            fs::remove_file(&path).ok();
            assert!(matches!(result, Err(FractureError::Format { .. })), "{sizes}");
        }
    }
}

/// MetaImage (`.mha`) reader and writer for single-file volumes
use super::{
    ComponentType, EncodedVolume, RawVolume, VolumeFormat, parse_floats, parse_sizes, split_header,
};
use crate::error::{FractureError, Result};
use crate::volume::Geometry;
use flate2::read::ZlibDecoder;
use nalgebra::{Matrix3, Point3, Vector3};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

pub struct MetaImageFormat;

fn parse_element_type(value: &str) -> Option<ComponentType> {
    let component = match value {
        "MET_CHAR" => ComponentType::Int8,
        "MET_UCHAR" => ComponentType::UInt8,
        "MET_SHORT" => ComponentType::Int16,
        "MET_USHORT" => ComponentType::UInt16,
        "MET_INT" | "MET_LONG" => ComponentType::Int32,
        "MET_UINT" | "MET_ULONG" => ComponentType::UInt32,
        "MET_FLOAT" => ComponentType::Float32,
        "MET_DOUBLE" => ComponentType::Float64,
        _ => return None,
    };
    Some(component)
}

fn element_type_name(component: ComponentType) -> &'static str {
    match component {
        ComponentType::Int8 => "MET_CHAR",
        ComponentType::UInt8 => "MET_UCHAR",
        ComponentType::Int16 => "MET_SHORT",
        ComponentType::UInt16 => "MET_USHORT",
        ComponentType::Int32 => "MET_INT",
        ComponentType::UInt32 => "MET_UINT",
        ComponentType::Float32 => "MET_FLOAT",
        ComponentType::Float64 => "MET_DOUBLE",
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

impl VolumeFormat for MetaImageFormat {
    fn supported_extensions(&self) -> Vec<&'static str> {
        vec!["mha"]
    }

    fn name(&self) -> &'static str {
        "MetaImage"
    }

    fn read(&self, path: &Path) -> Result<RawVolume> {
        let malformed = |message: String| FractureError::Format {
            format: "MetaImage",
            path: path.to_path_buf(),
            message,
        };

        let bytes = fs::read(path)?;
        let (lines, offset) = split_header(&bytes, |line| {
            line.trim_start().starts_with("ElementDataFile")
        })
        .ok_or_else(|| malformed("header has no ElementDataFile".into()))?;

        let mut dims = None;
        let mut size = None;
        let mut spacing = Vector3::repeat(1.0);
        let mut origin = Vector3::zeros();
        let mut direction = Matrix3::identity();
        let mut component = None;
        let mut big_endian = false;
        let mut compressed = false;

        for line in &lines {
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| malformed(format!("bad header line '{line}'")))?;
            let (key, value) = (key.trim(), value.trim());
            let bad = || malformed(format!("bad value for {key}: '{value}'"));
            match key {
                "NDims" => dims = Some(value.parse::<usize>().map_err(|_| bad())?),
                "DimSize" => {
                    size = Some(parse_sizes(value).ok_or_else(bad)?);
                }
                "ElementSpacing" => spacing = Vector3::from(parse_floats::<3>(value).ok_or_else(bad)?),
                "Offset" | "Position" | "Origin" => {
                    origin = Vector3::from(parse_floats::<3>(value).ok_or_else(bad)?)
                }
                "TransformMatrix" | "Rotation" | "Orientation" => {
                    let m = parse_floats::<9>(value).ok_or_else(bad)?;
                    // Row k of the stored matrix is the direction of axis k.
                    direction = Matrix3::from_row_slice(&m).transpose();
                }
                "ElementType" => {
                    component = Some(parse_element_type(value).ok_or_else(bad)?);
                }
                "BinaryDataByteOrderMSB" | "ElementByteOrderMSB" => {
                    big_endian = parse_bool(value).ok_or_else(bad)?;
                }
                "CompressedData" => compressed = parse_bool(value).ok_or_else(bad)?,
                "ElementDataFile" => {
                    if !value.eq_ignore_ascii_case("LOCAL") {
                        return Err(malformed(format!(
                            "detached data file '{value}' is not supported"
                        )));
                    }
                }
                "ElementNumberOfChannels" => {
                    if value != "1" {
                        return Err(malformed("only single-channel images are supported".into()));
                    }
                }
                _ => {}
            }
        }

        if dims != Some(3) {
            return Err(malformed(format!("NDims must be 3, got {dims:?}")));
        }
        let size = size.ok_or_else(|| malformed("missing DimSize".into()))?;
        let component = component.ok_or_else(|| malformed("missing ElementType".into()))?;
        let geometry = Geometry::new(size, spacing, Point3::from(origin), direction)
            .map_err(|e| malformed(e.to_string()))?;

        let payload = &bytes[offset..];
        let data = if compressed {
            let mut decoded = Vec::new();
            ZlibDecoder::new(payload)
                .read_to_end(&mut decoded)
                .map_err(|e| malformed(format!("zlib payload: {e}")))?;
            decoded
        } else {
            payload.to_vec()
        };

        Ok(RawVolume {
            geometry,
            component,
            big_endian,
            bytes: data,
        })
    }

    fn write(&self, path: &Path, volume: &EncodedVolume<'_>) -> Result<()> {
        let geometry = volume.geometry;
        let [nx, ny, nz] = geometry.size();
        let spacing = geometry.spacing();
        let origin = geometry.origin();

        // Column-major storage lists each axis direction in turn.
        let matrix: Vec<String> = geometry
            .direction()
            .as_slice()
            .iter()
            .map(|v| v.to_string())
            .collect();

        let header = format!(
            "ObjectType = Image\nNDims = 3\nBinaryData = True\nBinaryDataByteOrderMSB = False\n\
CompressedData = False\nTransformMatrix = {}\nOffset = {} {} {}\n\
ElementSpacing = {} {} {}\nDimSize = {nx} {ny} {nz}\n\
ElementType = {}\nElementDataFile = LOCAL\n",
            matrix.join(" "),
            origin.x,
            origin.y,
            origin.z,
            spacing.x,
            spacing.y,
            spacing.z,
            element_type_name(volume.component),
        );

        let mut file = fs::File::create(path)?;
        file.write_all(header.as_bytes())?;
        file.write_all(&volume.bytes)?;
        Ok(())
    }
}

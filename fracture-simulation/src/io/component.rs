/// On-disk scalar component types and their byte-level codecs
use crate::sample::Sample;
use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl ComponentType {
    /// Bytes per stored sample.
    pub fn size(self) -> usize {
        match self {
            ComponentType::Int8 | ComponentType::UInt8 => 1,
            ComponentType::Int16 | ComponentType::UInt16 => 2,
            ComponentType::Int32 | ComponentType::UInt32 | ComponentType::Float32 => 4,
            ComponentType::Float64 => 8,
        }
    }
}

/// Sample types that can be written to disk as-is.
pub trait StorableSample: Sample {
    const COMPONENT: ComponentType;
}

impl StorableSample for i8 {
    const COMPONENT: ComponentType = ComponentType::Int8;
}
impl StorableSample for u8 {
    const COMPONENT: ComponentType = ComponentType::UInt8;
}
impl StorableSample for i16 {
    const COMPONENT: ComponentType = ComponentType::Int16;
}
impl StorableSample for u16 {
    const COMPONENT: ComponentType = ComponentType::UInt16;
}
impl StorableSample for i32 {
    const COMPONENT: ComponentType = ComponentType::Int32;
}
impl StorableSample for u32 {
    const COMPONENT: ComponentType = ComponentType::UInt32;
}
impl StorableSample for f32 {
    const COMPONENT: ComponentType = ComponentType::Float32;
}
impl StorableSample for f64 {
    const COMPONENT: ComponentType = ComponentType::Float64;
}

/// Decode `count` stored samples into `T`, clamping values that do not fit.
/// Returns `None` when `bytes` is too short.
pub fn decode_samples<T: Sample>(
    bytes: &[u8],
    component: ComponentType,
    big_endian: bool,
    count: usize,
) -> Option<Vec<T>> {
    let needed = count.checked_mul(component.size())?;
    if bytes.len() < needed {
        return None;
    }
    let bytes = &bytes[..needed];
    Some(if big_endian {
        decode_with::<BigEndian, T>(bytes, component)
    } else {
        decode_with::<LittleEndian, T>(bytes, component)
    })
}

fn decode_with<B: ByteOrder, T: Sample>(bytes: &[u8], component: ComponentType) -> Vec<T> {
    bytes
        .chunks_exact(component.size())
        .map(|c| {
            let value = match component {
                ComponentType::Int8 => c[0] as i8 as f64,
                ComponentType::UInt8 => c[0] as f64,
                ComponentType::Int16 => B::read_i16(c) as f64,
                ComponentType::UInt16 => B::read_u16(c) as f64,
                ComponentType::Int32 => B::read_i32(c) as f64,
                ComponentType::UInt32 => B::read_u32(c) as f64,
                ComponentType::Float32 => B::read_f32(c) as f64,
                ComponentType::Float64 => B::read_f64(c),
            };
            T::from_f64_clamped(value)
        })
        .collect()
}

/// Encode samples little-endian in their own component type.
pub fn encode_samples<T: StorableSample>(data: &[T]) -> std::io::Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(data.len() * T::COMPONENT.size());
    for value in data {
        let v = value.to_f64();
        match T::COMPONENT {
            ComponentType::Int8 => bytes.write_i8(v as i8)?,
            ComponentType::UInt8 => bytes.write_u8(v as u8)?,
            ComponentType::Int16 => bytes.write_i16::<LittleEndian>(v as i16)?,
            ComponentType::UInt16 => bytes.write_u16::<LittleEndian>(v as u16)?,
            ComponentType::Int32 => bytes.write_i32::<LittleEndian>(v as i32)?,
            ComponentType::UInt32 => bytes.write_u32::<LittleEndian>(v as u32)?,
            ComponentType::Float32 => bytes.write_f32::<LittleEndian>(v as f32)?,
            ComponentType::Float64 => bytes.write_f64::<LittleEndian>(v)?,
        }
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_big_endian_shorts() {
        let bytes = [0x01, 0x02, 0xFF, 0xFE];
        let values: Vec<i16> = decode_samples(&bytes, ComponentType::Int16, true, 2).unwrap();
        assert_eq!(values, vec![0x0102, -2]);
    }

    #[test]
    fn converts_and_clamps_into_target_type() {
        let bytes = 300.7f32.to_le_bytes();
        let values: Vec<u8> = decode_samples(&bytes, ComponentType::Float32, false, 1).unwrap();
        assert_eq!(values, vec![255]);
        let values: Vec<i16> = decode_samples(&bytes, ComponentType::Float32, false, 1).unwrap();
        assert_eq!(values, vec![300]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(decode_samples::<i16>(&[0, 1, 2], ComponentType::Int16, false, 2).is_none());
    }

    #[test]
    fn encodes_little_endian() {
        let bytes = encode_samples(&[-2i16, 0x0102]).unwrap();
        assert_eq!(bytes, vec![0xFE, 0xFF, 0x02, 0x01]);
        let decoded: Vec<i16> = decode_samples(&bytes, i16::COMPONENT, false, 2).unwrap();
        assert_eq!(decoded, vec![-2, 0x0102]);
    }
}

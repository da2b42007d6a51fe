//! Persistence layout for save records.
//!
//! ```text
//! [field 0][field 1]...[field n-1]["CART"][version][crc8]
//! ```
//!
//! Fields are packed back-to-back in declaration order. 16-bit values are
//! little-endian (the SM83 byte order), arrays are written element by
//! element. The checksum covers every byte before it.

use crate::program::{Program, SaveRecord};
use crate::value::{IntType, Value};
use thiserror::Error;

/// Fixed marker written after the packed fields.
pub const SAVE_MAGIC: [u8; 4] = *b"CART";

/// CRC-8 with polynomial 0x07, initial value 0, no reflection or final xor.
pub fn crc8(bytes: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in bytes {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    #[error("save record '{record}' references unknown variable '{field}'")]
    UnknownField { record: String, field: String },

    #[error("no value supplied for field '{0}'")]
    MissingValue(String),

    #[error("expected {expected} bytes of save data, found {found}")]
    Length { expected: usize, found: usize },

    #[error("save data has the wrong magic marker")]
    BadMagic,

    #[error("save data version {found} does not match {expected}")]
    Version { expected: u8, found: u8 },

    #[error("save data checksum {found:#04x} does not match {expected:#04x}")]
    Checksum { expected: u8, found: u8 },
}

/// One packed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveField {
    pub name: String,
    pub ty: IntType,
    pub len: usize,
    /// Byte offset of the field inside the record.
    pub offset: usize,
}

impl SaveField {
    pub fn size(&self) -> usize {
        self.ty.bytes() * self.len
    }
}

/// Resolved byte layout of a [`SaveRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveLayout {
    pub record: String,
    pub version: u8,
    pub fields: Vec<SaveField>,
}

impl SaveLayout {
    pub fn new(program: &Program, record: &SaveRecord) -> Result<Self, SaveError> {
        let mut fields = Vec::with_capacity(record.fields.len());
        let mut offset = 0;
        for name in &record.fields {
            let var = program
                .variable(name)
                .ok_or_else(|| SaveError::UnknownField {
                    record: record.name.clone(),
                    field: name.clone(),
                })?;
            let field = SaveField {
                name: name.clone(),
                ty: var.ty,
                len: var.storage.len(),
                offset,
            };
            offset += field.size();
            fields.push(field);
        }
        Ok(Self {
            record: record.name.clone(),
            version: record.version,
            fields,
        })
    }

    /// Bytes taken by the packed fields alone.
    pub fn payload_size(&self) -> usize {
        self.fields.iter().map(SaveField::size).sum()
    }

    /// Total record size including magic, version and checksum.
    pub fn size(&self) -> usize {
        self.payload_size() + SAVE_MAGIC.len() + 2
    }

    /// Pack current values. `lookup` returns all elements of a field.
    pub fn pack(
        &self,
        mut lookup: impl FnMut(&str) -> Option<Vec<Value>>,
    ) -> Result<Vec<u8>, SaveError> {
        let mut out = Vec::with_capacity(self.size());
        for field in &self.fields {
            let values =
                lookup(&field.name).ok_or_else(|| SaveError::MissingValue(field.name.clone()))?;
            if values.len() != field.len {
                return Err(SaveError::MissingValue(field.name.clone()));
            }
            for value in values {
                out.extend(value.cast(field.ty).to_le_bytes());
            }
        }
        out.extend_from_slice(&SAVE_MAGIC);
        out.push(self.version);
        out.push(crc8(&out));
        Ok(out)
    }

    /// Verify and decode a packed record into `(field, elements)` pairs.
    pub fn unpack(&self, bytes: &[u8]) -> Result<Vec<(String, Vec<Value>)>, SaveError> {
        if bytes.len() != self.size() {
            return Err(SaveError::Length {
                expected: self.size(),
                found: bytes.len(),
            });
        }
        let (body, tail) = bytes.split_at(bytes.len() - 1);
        let expected = crc8(body);
        if tail[0] != expected {
            return Err(SaveError::Checksum {
                expected,
                found: tail[0],
            });
        }
        let payload = self.payload_size();
        if body[payload..payload + SAVE_MAGIC.len()] != SAVE_MAGIC {
            return Err(SaveError::BadMagic);
        }
        let version = body[payload + SAVE_MAGIC.len()];
        if version != self.version {
            return Err(SaveError::Version {
                expected: self.version,
                found: version,
            });
        }

        let mut out = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let width = field.ty.bytes();
            let values = (0..field.len)
                .map(|i| {
                    let start = field.offset + i * width;
                    Value::from_le_bytes(field.ty, &body[start..start + width])
                })
                .collect();
            out.push((field.name.clone(), values));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Storage, Variable};

    fn program() -> Program {
        Program {
            name: "t".into(),
            variables: vec![
                Variable {
                    name: "hi".into(),
                    ty: IntType::U16,
                    storage: Storage::Scalar,
                    initial: vec![Value::u16(0)],
                },
                Variable {
                    name: "lives".into(),
                    ty: IntType::I8,
                    storage: Storage::Array(2),
                    initial: vec![Value::i8(0); 2],
                },
            ],
            sprites: vec![],
            entities: vec![],
            pools: vec![],
            scenes: vec![],
            assets: vec![],
            save_records: vec![],
            start_scene: "main".into(),
        }
    }

    fn layout() -> SaveLayout {
        let record = SaveRecord {
            name: "slot".into(),
            fields: vec!["hi".into(), "lives".into()],
            version: 3,
        };
        SaveLayout::new(&program(), &record).unwrap()
    }

    fn values(name: &str) -> Option<Vec<Value>> {
        match name {
            "hi" => Some(vec![Value::u16(0x1234)]),
            "lives" => Some(vec![Value::i8(-1), Value::i8(5)]),
            _ => None,
        }
    }

    #[test]
    fn crc8_known_vector() {
        // CRC-8/SMBUS check value for "123456789".
        assert_eq!(crc8(b"123456789"), 0xF4);
        assert_eq!(crc8(&[]), 0);
    }

    #[test]
    fn pack_byte_order() {
        let bytes = layout().pack(values).unwrap();
        assert_eq!(&bytes[..4], &[0x34, 0x12, 0xFF, 0x05]);
        assert_eq!(&bytes[4..8], b"CART");
        assert_eq!(bytes[8], 3);
        assert_eq!(bytes[9], crc8(&bytes[..9]));
        assert_eq!(bytes.len(), layout().size());
    }

    #[test]
    fn unpack_restores_values() {
        let l = layout();
        let bytes = l.pack(values).unwrap();
        let fields = l.unpack(&bytes).unwrap();
        assert_eq!(fields[0], ("hi".to_string(), vec![Value::u16(0x1234)]));
        assert_eq!(
            fields[1],
            ("lives".to_string(), vec![Value::i8(-1), Value::i8(5)])
        );
    }

    #[test]
    fn unpack_detects_corruption() {
        let l = layout();
        let mut bytes = l.pack(values).unwrap();
        bytes[0] ^= 0x01;
        assert!(matches!(l.unpack(&bytes), Err(SaveError::Checksum { .. })));
        assert!(matches!(
            l.unpack(&bytes[..3]),
            Err(SaveError::Length { expected: 10, found: 3 })
        ));
    }

    #[test]
    fn unpack_detects_version_change() {
        let l = layout();
        let mut bytes = l.pack(values).unwrap();
        bytes[8] = 4;
        let n = bytes.len();
        bytes[n - 1] = crc8(&bytes[..n - 1]);
        assert_eq!(
            l.unpack(&bytes),
            Err(SaveError::Version {
                expected: 3,
                found: 4
            })
        );
    }

    #[test]
    fn unknown_field_is_reported() {
        let record = SaveRecord {
            name: "slot".into(),
            fields: vec!["missing".into()],
            version: 1,
        };
        assert!(matches!(
            SaveLayout::new(&program(), &record),
            Err(SaveError::UnknownField { .. })
        ));
    }
}

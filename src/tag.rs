//! Named binary tag trees.
//!
//! Chunks and world metadata are stored as a tree of named, typed tags. The
//! decoder works on an already decompressed buffer and never reads past its
//! end: every declared length is checked against the remaining bytes before
//! anything is allocated.

use crate::error::FormatError;
use byteorder::{BigEndian, ByteOrder};
use std::collections::HashMap;
use std::slice;

/// Maximum depth of nested lists and compounds.
const MAXIMUM_NESTING_DEPTH: usize = 512;

/// Kind of a tag, as stored in the kind byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TagKind {
    End = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    ByteArray = 7,
    String = 8,
    List = 9,
    Compound = 10,
    IntArray = 11,
    LongArray = 12,
}

impl TagKind {
    pub fn from_id(id: u8) -> Option<TagKind> {
        use TagKind::*;
        let kind = match id {
            0 => End,
            1 => Byte,
            2 => Short,
            3 => Int,
            4 => Long,
            5 => Float,
            6 => Double,
            7 => ByteArray,
            8 => String,
            9 => List,
            10 => Compound,
            11 => IntArray,
            12 => LongArray,
            _ => return None,
        };

        Some(kind)
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(ListTag),
    Compound(CompoundTag),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn kind(&self) -> TagKind {
        match self {
            Tag::End => TagKind::End,
            Tag::Byte(_) => TagKind::Byte,
            Tag::Short(_) => TagKind::Short,
            Tag::Int(_) => TagKind::Int,
            Tag::Long(_) => TagKind::Long,
            Tag::Float(_) => TagKind::Float,
            Tag::Double(_) => TagKind::Double,
            Tag::ByteArray(_) => TagKind::ByteArray,
            Tag::String(_) => TagKind::String,
            Tag::List(_) => TagKind::List,
            Tag::Compound(_) => TagKind::Compound,
            Tag::IntArray(_) => TagKind::IntArray,
            Tag::LongArray(_) => TagKind::LongArray,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self {
            Tag::Byte(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Tag::Short(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Tag::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Tag::Long(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Tag::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Tag::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_byte_array(&self) -> Option<&[i8]> {
        match self {
            Tag::ByteArray(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Tag::IntArray(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_long_array(&self) -> Option<&[i64]> {
        match self {
            Tag::LongArray(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListTag> {
        match self {
            Tag::List(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&CompoundTag> {
        match self {
            Tag::Compound(value) => Some(value),
            _ => None,
        }
    }
}

/// List of unnamed tags which all have the declared element kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ListTag {
    element_kind: TagKind,
    elements: Vec<Tag>,
}

impl ListTag {
    pub fn new(element_kind: TagKind, elements: Vec<Tag>) -> Self {
        debug_assert!(
            elements.iter().all(|tag| tag.kind() == element_kind),
            "List elements must match the element kind"
        );

        ListTag {
            element_kind,
            elements,
        }
    }

    pub fn element_kind(&self) -> TagKind {
        self.element_kind
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tag> {
        self.elements.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, Tag> {
        self.elements.iter()
    }
}

impl<'a> IntoIterator for &'a ListTag {
    type Item = &'a Tag;
    type IntoIter = slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// Named tags in the order they were first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompoundTag {
    entries: Vec<(String, Tag)>,
    /// Slot in `entries` of every name.
    indices: HashMap<String, usize>,
}

impl CompoundTag {
    pub fn new() -> Self {
        CompoundTag::default()
    }

    /// Inserts the tag, replacing the value of a member with the same name.
    ///
    /// A replaced member keeps its position.
    pub fn insert(&mut self, name: String, tag: Tag) {
        match self.indices.get(&name) {
            Some(&index) => self.entries[index].1 = tag,
            None => {
                self.indices.insert(name.clone(), self.entries.len());
                self.entries.push((name, tag));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.indices.get(name).map(|&index| &self.entries[index].1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.entries.iter().map(|(name, tag)| (name.as_str(), tag))
    }

    pub fn get_i8(&self, name: &str) -> Option<i8> {
        self.get(name).and_then(Tag::as_i8)
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(Tag::as_i32)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Tag::as_i64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Tag::as_str)
    }

    pub fn get_int_array(&self, name: &str) -> Option<&[i32]> {
        self.get(name).and_then(Tag::as_int_array)
    }

    pub fn get_long_array(&self, name: &str) -> Option<&[i64]> {
        self.get(name).and_then(Tag::as_long_array)
    }

    pub fn get_list(&self, name: &str) -> Option<&ListTag> {
        self.get(name).and_then(Tag::as_list)
    }

    pub fn get_compound_tag(&self, name: &str) -> Option<&CompoundTag> {
        self.get(name).and_then(Tag::as_compound)
    }
}

/// Decodes a buffer holding a single root compound, discarding its name.
pub fn decode(bytes: &[u8]) -> Result<CompoundTag, FormatError> {
    decode_named(bytes).map(|(_, compound_tag)| compound_tag)
}

/// Decodes a buffer holding a single root compound.
pub fn decode_named(bytes: &[u8]) -> Result<(String, CompoundTag), FormatError> {
    let mut decoder = Decoder::new(bytes);
    let kind = decoder.read_u8()?;

    if kind != TagKind::Compound.id() {
        return Err(FormatError::RootNotCompound { kind });
    }

    let name = decoder.read_string()?;
    let compound_tag = decoder.read_compound(0)?;

    Ok((name, compound_tag))
}

struct Decoder<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> Decoder<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        Decoder {
            buffer,
            position: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    fn take(&mut self, length: usize) -> Result<&'a [u8], FormatError> {
        let remaining = self.remaining();

        if length > remaining {
            return Err(FormatError::LengthExceedsBuffer {
                offset: self.position,
                length,
                remaining,
            });
        }

        let bytes = &self.buffer[self.position..self.position + length];
        self.position += length;

        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    fn read_i16(&mut self) -> Result<i16, FormatError> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    fn read_i32(&mut self) -> Result<i32, FormatError> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    fn read_i64(&mut self) -> Result<i64, FormatError> {
        Ok(BigEndian::read_i64(self.take(8)?))
    }

    fn read_string(&mut self) -> Result<String, FormatError> {
        let length = BigEndian::read_u16(self.take(2)?) as usize;
        let bytes = self.take(length)?;

        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Reads an element count and checks that `count * element_length` bytes are left.
    fn read_count(&mut self, element_length: usize) -> Result<usize, FormatError> {
        let offset = self.position;
        let count = self.read_i32()?;

        if count < 0 {
            return Err(FormatError::NegativeLength {
                offset,
                length: count,
            });
        }

        let length = count as usize * element_length;
        let remaining = self.remaining();

        if length > remaining {
            return Err(FormatError::LengthExceedsBuffer {
                offset,
                length,
                remaining,
            });
        }

        Ok(count as usize)
    }

    fn read_payload(&mut self, kind: TagKind, depth: usize) -> Result<Tag, FormatError> {
        let tag = match kind {
            TagKind::End => Tag::End,
            TagKind::Byte => Tag::Byte(self.read_u8()? as i8),
            TagKind::Short => Tag::Short(self.read_i16()?),
            TagKind::Int => Tag::Int(self.read_i32()?),
            TagKind::Long => Tag::Long(self.read_i64()?),
            TagKind::Float => Tag::Float(BigEndian::read_f32(self.take(4)?)),
            TagKind::Double => Tag::Double(BigEndian::read_f64(self.take(8)?)),
            TagKind::ByteArray => {
                let count = self.read_count(1)?;
                let bytes = self.take(count)?;

                Tag::ByteArray(bytes.iter().map(|&byte| byte as i8).collect())
            }
            TagKind::String => Tag::String(self.read_string()?),
            TagKind::List => Tag::List(self.read_list(depth + 1)?),
            TagKind::Compound => Tag::Compound(self.read_compound(depth + 1)?),
            TagKind::IntArray => {
                let count = self.read_count(4)?;
                let bytes = self.take(count * 4)?;

                Tag::IntArray(bytes.chunks_exact(4).map(BigEndian::read_i32).collect())
            }
            TagKind::LongArray => {
                let count = self.read_count(8)?;
                let bytes = self.take(count * 8)?;

                Tag::LongArray(bytes.chunks_exact(8).map(BigEndian::read_i64).collect())
            }
        };

        Ok(tag)
    }

    fn read_kind(&mut self) -> Result<TagKind, FormatError> {
        let offset = self.position;
        let id = self.read_u8()?;

        TagKind::from_id(id).ok_or(FormatError::UnknownTagKind { kind: id, offset })
    }

    fn read_list(&mut self, depth: usize) -> Result<ListTag, FormatError> {
        self.check_depth(depth)?;

        let offset = self.position;
        let element_kind = self.read_kind()?;

        // Empty lists are written with End as element kind.
        if element_kind == TagKind::End {
            let count = self.read_i32()?;

            if count > 0 {
                return Err(FormatError::EndListNotEmpty { offset, count });
            }

            return Ok(ListTag {
                element_kind,
                elements: Vec::new(),
            });
        }

        // Every other element kind takes at least one byte.
        let count = self.read_count(1)?;
        let mut elements = Vec::with_capacity(count);

        for _ in 0..count {
            elements.push(self.read_payload(element_kind, depth)?);
        }

        Ok(ListTag {
            element_kind,
            elements,
        })
    }

    fn read_compound(&mut self, depth: usize) -> Result<CompoundTag, FormatError> {
        self.check_depth(depth)?;

        let mut compound_tag = CompoundTag::new();

        loop {
            if self.remaining() == 0 {
                return Err(FormatError::UnterminatedCompound {
                    offset: self.position,
                });
            }

            let kind = self.read_kind()?;

            if kind == TagKind::End {
                return Ok(compound_tag);
            }

            let name = self.read_string()?;
            let tag = self.read_payload(kind, depth)?;

            compound_tag.insert(name, tag);
        }
    }

    fn check_depth(&self, depth: usize) -> Result<(), FormatError> {
        if depth > MAXIMUM_NESTING_DEPTH {
            return Err(FormatError::NestingTooDeep {
                offset: self.position,
            });
        }

        Ok(())
    }
}

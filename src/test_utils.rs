//! Builders for tag trees and region images used by the tests.

use crate::tag::{CompoundTag, ListTag, Tag, TagKind};
use byteorder::{BigEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

/// Encodes a root compound with the given name.
pub fn encode(name: &str, root: &CompoundTag) -> Vec<u8> {
    let mut buffer = Vec::new();

    buffer.push(TagKind::Compound.id());
    write_string(&mut buffer, name);
    write_payload(&mut buffer, &Tag::Compound(root.clone()));

    buffer
}

fn write_string(buffer: &mut Vec<u8>, value: &str) {
    buffer.write_u16::<BigEndian>(value.len() as u16).unwrap();
    buffer.extend_from_slice(value.as_bytes());
}

fn write_payload(buffer: &mut Vec<u8>, tag: &Tag) {
    match tag {
        Tag::End => {}
        Tag::Byte(value) => buffer.write_i8(*value).unwrap(),
        Tag::Short(value) => buffer.write_i16::<BigEndian>(*value).unwrap(),
        Tag::Int(value) => buffer.write_i32::<BigEndian>(*value).unwrap(),
        Tag::Long(value) => buffer.write_i64::<BigEndian>(*value).unwrap(),
        Tag::Float(value) => buffer.write_f32::<BigEndian>(*value).unwrap(),
        Tag::Double(value) => buffer.write_f64::<BigEndian>(*value).unwrap(),
        Tag::ByteArray(values) => {
            buffer.write_i32::<BigEndian>(values.len() as i32).unwrap();
            values.iter().for_each(|value| buffer.write_i8(*value).unwrap());
        }
        Tag::String(value) => write_string(buffer, value),
        Tag::List(list) => {
            buffer.push(list.element_kind().id());
            buffer.write_i32::<BigEndian>(list.len() as i32).unwrap();
            list.iter().for_each(|element| write_payload(buffer, element));
        }
        Tag::Compound(compound_tag) => {
            for (name, tag) in compound_tag.iter() {
                buffer.push(tag.kind().id());
                write_string(buffer, name);
                write_payload(buffer, tag);
            }

            buffer.push(TagKind::End.id());
        }
        Tag::IntArray(values) => {
            buffer.write_i32::<BigEndian>(values.len() as i32).unwrap();
            values
                .iter()
                .for_each(|value| buffer.write_i32::<BigEndian>(*value).unwrap());
        }
        Tag::LongArray(values) => {
            buffer.write_i32::<BigEndian>(values.len() as i32).unwrap();
            values
                .iter()
                .for_each(|value| buffer.write_i64::<BigEndian>(*value).unwrap());
        }
    }
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Packs palette indices without padding, entries may span two words.
pub fn pack(indices: &[u64], bits: usize) -> Vec<i64> {
    let words = (indices.len() * bits + 63) / 64;
    let mut packed = vec![0u64; words];

    for (index, &value) in indices.iter().enumerate() {
        let bit_offset = index * bits;
        let word = bit_offset / 64;
        let shift = bit_offset % 64;

        packed[word] |= value << shift;

        if shift + bits > 64 {
            packed[word + 1] |= value >> (64 - shift);
        }
    }

    packed.into_iter().map(|word| word as i64).collect()
}

pub fn section(y: i8, palette: &[&str], block_states: Vec<i64>) -> Tag {
    let palette = palette
        .iter()
        .map(|name| {
            let mut block = CompoundTag::new();
            block.insert("Name".to_owned(), Tag::String(name.to_string()));
            Tag::Compound(block)
        })
        .collect();

    let mut section = CompoundTag::new();
    section.insert("Y".to_owned(), Tag::Byte(y));
    section.insert(
        "Palette".to_owned(),
        Tag::List(ListTag::new(TagKind::Compound, palette)),
    );
    section.insert("BlockStates".to_owned(), Tag::LongArray(block_states));

    Tag::Compound(section)
}

/// Root compound of a chunk with a `Level` holding the given sections.
pub fn chunk(last_update: i64, sections: Vec<Tag>, biomes: Option<Vec<i32>>) -> CompoundTag {
    let mut level = CompoundTag::new();
    level.insert("LastUpdate".to_owned(), Tag::Long(last_update));
    level.insert(
        "Sections".to_owned(),
        Tag::List(ListTag::new(TagKind::Compound, sections)),
    );

    if let Some(biomes) = biomes {
        level.insert("Biomes".to_owned(), Tag::IntArray(biomes));
    }

    let mut root = CompoundTag::new();
    root.insert("Level".to_owned(), Tag::Compound(level));
    root
}

/// Assembles a region image, chunks are placed in consecutive sectors after the header.
pub struct RegionBuilder {
    header: Vec<u8>,
    sectors: Vec<u8>,
}

impl RegionBuilder {
    pub fn new() -> Self {
        RegionBuilder {
            header: vec![0; 8192],
            sectors: Vec::new(),
        }
    }

    /// Appends a payload with the given compression byte at the next free sector.
    pub fn chunk(mut self, x: usize, z: usize, compression: u8, payload: &[u8]) -> Self {
        let sector = 2 + self.sectors.len() / 4096;
        let mut data = Vec::new();

        data.write_u32::<BigEndian>(payload.len() as u32 + 1).unwrap();
        data.push(compression);
        data.extend_from_slice(payload);

        let sectors = (data.len() + 4095) / 4096;
        data.resize(sectors * 4096, 0);
        self.sectors.extend_from_slice(&data);

        self.entry(x, z, sector as u32, sectors as u8)
    }

    pub fn zlib_chunk(self, x: usize, z: usize, root: &CompoundTag) -> Self {
        self.chunk(x, z, 2, &zlib(&encode("", root)))
    }

    /// Writes a location entry without any payload.
    pub fn entry(mut self, x: usize, z: usize, sector: u32, sectors: u8) -> Self {
        let offset = 4 * (x + z * 32);

        self.header[offset] = (sector >> 16) as u8;
        self.header[offset + 1] = (sector >> 8) as u8;
        self.header[offset + 2] = sector as u8;
        self.header[offset + 3] = sectors;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut bytes = self.header;
        bytes.extend_from_slice(&self.sectors);
        bytes
    }
}

#[test]
fn test_pack_spans_words() {
    // Entry 12 of width 5 starts at bit 60 and continues in the second word.
    let mut indices = vec![0u64; 13];
    indices[12] = 0b10111;

    let packed = pack(&indices, 5);

    assert_eq!(packed[0] as u64 >> 60, 0b0111);
    assert_eq!(packed[1], 0b1);
}

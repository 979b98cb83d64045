//! Block and biome lookups on a decoded chunk.
//!
//! Block states of a section are palette indices packed into 64-bit words
//! without padding: an entry may start in one word and continue in the low
//! bits of the next.

use crate::error::FormatError;
use crate::path::PathSpec;
use crate::tag::{self, CompoundTag, Tag, TagKind};

/// Block returned for empty sections and unused palette indices.
pub const AIR: &str = "air";

/// Amount of sections in a chunk.
pub const CHUNK_SECTIONS: usize = 16;

const NAMESPACE_PREFIX: &str = "minecraft:";

/// One 16x16x16 slice of a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Block names, without the `minecraft:` namespace.
    palette: Vec<String>,
    /// Packed palette indices.
    block_states: Vec<i64>,
}

impl Section {
    pub fn palette(&self) -> &[String] {
        &self.palette
    }

    pub fn block_states(&self) -> &[i64] {
        &self.block_states
    }

    /// Block name of a cell, coordinates are section relative.
    fn block(&self, x: usize, y: usize, z: usize) -> &str {
        let bits = bit_width(self.palette.len());
        let index = y * 16 * 16 + z * 16 + x;
        let state = index * bits / 64;

        let data = match self.block_states.get(state) {
            Some(&data) => data as u64,
            None => return AIR,
        };

        let bit_offset = (bits * index) % 64;
        let mut shifted_data = data >> bit_offset;

        if 64 - bit_offset < bits {
            let data = match self.block_states.get(state + 1) {
                Some(&data) => data as u64,
                None => return AIR,
            };

            let leftover = (bits - ((state + 1) * 64 % bits)) % bits;
            shifted_data |= (data & mask(leftover)) << (bits - leftover);
        }

        let palette_id = (shifted_data & mask(bits)) as usize;

        if palette_id == 0 {
            return AIR;
        }

        self.palette.get(palette_id).map_or(AIR, String::as_str)
    }
}

/// Bits used per block state for a palette of the given length.
///
/// Four bits up to 16 entries, otherwise enough bits for the largest index.
pub fn bit_width(palette_length: usize) -> usize {
    if palette_length <= 16 {
        return 4;
    }

    let mut bits = palette_length as u64 - 1;

    // Next power of two above the largest index.
    bits |= bits >> 1;
    bits |= bits >> 2;
    bits |= bits >> 4;
    bits |= bits >> 8;
    bits |= bits >> 16;
    bits += 1;

    bits.trailing_zeros() as usize
}

fn mask(bits: usize) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

/// Decoded chunk column, 16x256x16 blocks.
#[derive(Debug, Clone)]
pub struct Chunk {
    root: CompoundTag,
    last_update: i64,
    sections: [Option<Section>; CHUNK_SECTIONS],
    biomes: Vec<i32>,
}

impl Chunk {
    /// Decodes an uncompressed chunk tag tree.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        Chunk::new(tag::decode(bytes)?)
    }

    pub fn new(root: CompoundTag) -> Result<Self, FormatError> {
        if root.get_compound_tag("Level").is_none() {
            return Err(FormatError::MissingTag { name: "Level" });
        }

        let last_update = PathSpec::root()
            .child("Level")
            .child("LastUpdate")
            .query(&root)
            .and_then(|tag| tag.as_i64())
            .unwrap_or(0);

        let mut chunk = Chunk {
            root,
            last_update,
            sections: Default::default(),
            biomes: Vec::new(),
        };

        chunk.parse_fields()?;

        Ok(chunk)
    }

    /// Reads sections and biomes from the tag tree.
    ///
    /// Sections with a missing or out of range `Y` are skipped.
    pub fn parse_fields(&mut self) -> Result<(), FormatError> {
        let mut sections: [Option<Section>; CHUNK_SECTIONS] = Default::default();
        let level = PathSpec::root().child("Level");

        let sections_path = level.clone().child("Sections");
        let sections_tag = sections_path
            .query(&self.root)
            .ok_or(FormatError::MissingTag { name: "Sections" })?;
        let sections_list = sections_tag.as_list().ok_or(FormatError::UnexpectedTagKind {
            name: "Sections",
            kind: sections_tag.kind().id(),
        })?;

        if !sections_list.is_empty() && sections_list.element_kind() != TagKind::Compound {
            return Err(FormatError::UnexpectedTagKind {
                name: "Sections",
                kind: sections_list.element_kind().id(),
            });
        }

        for section_tag in sections_list {
            let section_tag = match section_tag.as_compound() {
                Some(section_tag) => section_tag,
                None => continue,
            };

            let y = match section_tag.get_i8("Y") {
                Some(y) if (0..CHUNK_SECTIONS as i8).contains(&y) => y as usize,
                _ => continue,
            };

            sections[y] = read_section(section_tag)?;
        }

        let biomes = level
            .child("Biomes")
            .query(&self.root)
            .and_then(|tag| tag.as_int_array().map(<[i32]>::to_vec))
            .unwrap_or_default();

        self.sections = sections;
        self.biomes = biomes;

        Ok(())
    }

    pub fn last_update(&self) -> i64 {
        self.last_update
    }

    /// Section at the given section index, if it has a palette.
    pub fn section(&self, y: usize) -> Option<&Section> {
        self.sections.get(y).and_then(Option::as_ref)
    }

    pub fn biomes(&self) -> &[i32] {
        &self.biomes
    }

    /// Best effort lookup of any field of the chunk.
    pub fn query(&self, path: &PathSpec) -> Option<Tag> {
        path.query(&self.root).map(|tag| tag.into_owned())
    }

    /// Block name at chunk relative coordinates.
    ///
    /// `None` when the coordinates are outside of the chunk.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Option<&str> {
        if x < 0 || 15 < x || y < 0 || 255 < y || z < 0 || 15 < z {
            return None;
        }

        let (x, y, z) = (x as usize, y as usize, z as usize);

        let block = match self.section(y / 16) {
            Some(section) => section.block(x, y % 16, z),
            None => AIR,
        };

        Some(block)
    }

    /// Biome id at chunk relative coordinates, 0 when unknown.
    ///
    /// 256 biomes are one per 2x2 column, 1024 biomes one per 4x4x4 cell in
    /// four 64 block tall bands.
    pub fn get_biome(&self, x: i32, y: i32, z: i32) -> i32 {
        let index = match self.biomes.len() {
            256 => (z / 2) * 16 + (x / 2),
            1024 => (y / 64) * 256 + (z / 4) * 4 + (x / 4),
            _ => return 0,
        };

        if index < 0 {
            return 0;
        }

        self.biomes.get(index as usize).copied().unwrap_or(0)
    }

    /// Top block Y of the highest section with blocks, 0 for an empty chunk.
    pub fn get_max_height(&self) -> i32 {
        self.sections
            .iter()
            .rposition(|section| {
                section
                    .as_ref()
                    .map_or(false, |section| !section.palette.is_empty())
            })
            .map_or(0, |y| y as i32 * 16 + 15)
    }
}

/// `None` when the section has no palette.
fn read_section(section_tag: &CompoundTag) -> Result<Option<Section>, FormatError> {
    let palette_list = match section_tag.get_list("Palette") {
        Some(palette_list) => palette_list,
        None => return Ok(None),
    };

    if !palette_list.is_empty() && palette_list.element_kind() != TagKind::Compound {
        return Err(FormatError::UnexpectedTagKind {
            name: "Palette",
            kind: palette_list.element_kind().id(),
        });
    }

    let mut palette = Vec::with_capacity(palette_list.len());

    for block in palette_list.iter().filter_map(Tag::as_compound) {
        let name = block
            .get_str("Name")
            .ok_or(FormatError::MissingTag { name: "Name" })?;

        let name = if name.starts_with(NAMESPACE_PREFIX) {
            &name[NAMESPACE_PREFIX.len()..]
        } else {
            name
        };

        palette.push(name.to_owned());
    }

    let block_states = section_tag
        .get_long_array("BlockStates")
        .map(<[i64]>::to_vec)
        .unwrap_or_default();

    Ok(Some(Section {
        palette,
        block_states,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::ListTag;
    use crate::test_utils::{chunk, encode, pack, section};

    fn cell(x: usize, y: usize, z: usize) -> usize {
        y * 256 + z * 16 + x
    }

    fn single_section_chunk(y: i8, palette: &[&str], block_states: Vec<i64>) -> Chunk {
        Chunk::new(chunk(0, vec![section(y, palette, block_states)], None)).unwrap()
    }

    #[test]
    fn test_bit_width() {
        let expected = [
            (0, 4),
            (1, 4),
            (15, 4),
            (16, 4),
            (17, 5),
            (32, 5),
            (33, 6),
            (256, 8),
            (257, 9),
        ];

        for &(length, bits) in expected.iter() {
            assert_eq!(bit_width(length), bits, "palette of {} entries", length);
        }
    }

    #[test]
    fn test_bit_width_matches_log2() {
        for length in 1..5000usize {
            let expected = (length.max(16) as f64).log2().ceil() as usize;

            assert_eq!(bit_width(length), expected, "palette of {} entries", length);
        }
    }

    #[test]
    fn test_get_block_four_bits() {
        let mut indices = vec![0u64; 4096];
        indices[cell(1, 2, 3)] = 1;
        indices[cell(15, 15, 15)] = 2;

        let palette = ["minecraft:air", "minecraft:stone", "dirt"];
        let chunk = single_section_chunk(0, &palette, pack(&indices, 4));

        assert_eq!(chunk.get_block(1, 2, 3), Some("stone"));
        assert_eq!(chunk.get_block(15, 15, 15), Some("dirt"));
        assert_eq!(chunk.get_block(0, 0, 0), Some(AIR));
    }

    #[test]
    fn test_get_block_across_words() {
        // 17 entries need 5 bits, so entries straddle word boundaries.
        let palette: Vec<String> = (0..17).map(|i| format!("minecraft:block_{}", i)).collect();
        let palette: Vec<&str> = palette.iter().map(String::as_str).collect();
        let indices: Vec<u64> = (0..4096u64).map(|i| i % 17).collect();

        let chunk = single_section_chunk(2, &palette, pack(&indices, 5));

        for &(x, y, z) in &[(12, 32, 0), (0, 33, 0), (5, 40, 9), (15, 47, 15)] {
            let expected = (cell(x, y - 32, z) % 17) as usize;
            let block = chunk.get_block(x as i32, y as i32, z as i32);

            if expected == 0 {
                assert_eq!(block, Some(AIR));
            } else {
                assert_eq!(block, Some(format!("block_{}", expected).as_str()));
            }
        }
    }

    #[test]
    fn test_get_block_every_cell_across_words() {
        let palette: Vec<String> = (0..40).map(|i| format!("b{}", i)).collect();
        let palette: Vec<&str> = palette.iter().map(String::as_str).collect();
        let indices: Vec<u64> = (0..4096u64).map(|i| (i * 7) % 40).collect();

        let chunk = single_section_chunk(0, &palette, pack(&indices, 6));

        for y in 0..16 {
            for z in 0..16 {
                for x in 0..16 {
                    let expected = indices[cell(x, y, z)] as usize;
                    let block = chunk.get_block(x as i32, y as i32, z as i32).unwrap();

                    if expected == 0 {
                        assert_eq!(block, AIR);
                    } else {
                        assert_eq!(block, palette[expected]);
                    }
                }
            }
        }
    }

    #[test]
    fn test_get_block_index_outside_palette() {
        let mut indices = vec![0u64; 4096];
        indices[cell(0, 0, 0)] = 9;

        let chunk = single_section_chunk(0, &["air", "stone"], pack(&indices, 4));

        assert_eq!(chunk.get_block(0, 0, 0), Some(AIR));
    }

    #[test]
    fn test_get_block_index_zero_is_air() {
        let indices = vec![0u64; 4096];

        let chunk = single_section_chunk(0, &["stone", "dirt"], pack(&indices, 4));

        assert_eq!(chunk.get_block(4, 4, 4), Some(AIR));
    }

    #[test]
    fn test_get_block_missing_section() {
        let chunk = single_section_chunk(0, &["air", "stone"], vec![-1; 256]);

        assert_eq!(chunk.get_block(0, 16, 0), Some(AIR));
        assert_eq!(chunk.get_block(0, 255, 0), Some(AIR));
    }

    #[test]
    fn test_get_block_short_block_states() {
        let chunk = single_section_chunk(0, &["air", "stone"], vec![0x11]);

        assert_eq!(chunk.get_block(1, 0, 0), Some("stone"));
        assert_eq!(chunk.get_block(0, 15, 15), Some(AIR));
    }

    #[test]
    fn test_get_block_outside_chunk() {
        let chunk = single_section_chunk(0, &["air", "stone"], vec![-1; 256]);

        assert_eq!(chunk.get_block(-1, 0, 0), None);
        assert_eq!(chunk.get_block(16, 0, 0), None);
        assert_eq!(chunk.get_block(0, 256, 0), None);
        assert_eq!(chunk.get_block(0, -1, 0), None);
        assert_eq!(chunk.get_block(0, 0, 16), None);
    }

    #[test]
    fn test_sections_out_of_range_skipped() {
        let root = chunk(
            0,
            vec![
                section(-1, &["air", "stone"], vec![-1; 256]),
                section(16, &["air", "stone"], vec![-1; 256]),
                section(3, &["air", "stone"], vec![0x11; 256]),
            ],
            None,
        );

        let chunk = Chunk::new(root).unwrap();

        assert_eq!(chunk.section(0), None);
        assert!(chunk.section(3).is_some());
        assert_eq!(chunk.get_max_height(), 63);
    }

    #[test]
    fn test_section_without_y_skipped() {
        let mut without_y = CompoundTag::new();
        without_y.insert("Palette".to_owned(), Tag::List(ListTag::new(TagKind::End, vec![])));

        let mut wrong_kind = CompoundTag::new();
        wrong_kind.insert("Y".to_owned(), Tag::Int(1));

        let root = chunk(
            0,
            vec![Tag::Compound(without_y), Tag::Compound(wrong_kind)],
            None,
        );

        let chunk = Chunk::new(root).unwrap();

        assert_eq!(chunk.get_max_height(), 0);
    }

    #[test]
    fn test_missing_level() {
        let root = CompoundTag::new();

        assert_eq!(
            Chunk::new(root).err(),
            Some(FormatError::MissingTag { name: "Level" })
        );
    }

    #[test]
    fn test_missing_sections() {
        let mut level = CompoundTag::new();
        level.insert("LastUpdate".to_owned(), Tag::Long(5));

        let mut root = CompoundTag::new();
        root.insert("Level".to_owned(), Tag::Compound(level));

        assert_eq!(
            Chunk::new(root).err(),
            Some(FormatError::MissingTag { name: "Sections" })
        );
    }

    #[test]
    fn test_palette_entry_without_name() {
        let mut palette = CompoundTag::new();
        palette.insert(
            "Palette".to_owned(),
            Tag::List(ListTag::new(
                TagKind::Compound,
                vec![Tag::Compound(CompoundTag::new())],
            )),
        );
        palette.insert("Y".to_owned(), Tag::Byte(0));

        let root = chunk(0, vec![Tag::Compound(palette)], None);

        assert_eq!(
            Chunk::new(root).err(),
            Some(FormatError::MissingTag { name: "Name" })
        );
    }

    #[test]
    fn test_section_without_palette() {
        let mut no_palette = CompoundTag::new();
        no_palette.insert("Y".to_owned(), Tag::Byte(5));

        let chunk = Chunk::new(chunk(0, vec![Tag::Compound(no_palette)], None)).unwrap();

        assert_eq!(chunk.section(5), None);
        assert_eq!(chunk.get_block(0, 80, 0), Some(AIR));
        assert_eq!(chunk.get_max_height(), 0);
    }

    #[test]
    fn test_max_height() {
        let root = chunk(
            0,
            vec![
                section(0, &["air", "stone"], vec![]),
                section(7, &["air", "stone"], vec![]),
                section(9, &[], vec![]),
            ],
            None,
        );

        let chunk = Chunk::new(root).unwrap();

        assert_eq!(chunk.get_max_height(), 127);
    }

    #[test]
    fn test_biomes_2d() {
        let biomes: Vec<i32> = (0..256).collect();
        let chunk = Chunk::new(chunk(0, vec![], Some(biomes))).unwrap();

        // (5 / 2) * 16 + (3 / 2)
        assert_eq!(chunk.get_biome(3, 0, 5), 33);
        assert_eq!(chunk.get_biome(3, 200, 5), 33);
    }

    #[test]
    fn test_biomes_3d() {
        let biomes: Vec<i32> = (0..1024).collect();
        let chunk = Chunk::new(chunk(0, vec![], Some(biomes))).unwrap();

        // (70 / 64) * 256 + (5 / 4) * 4 + (3 / 4)
        assert_eq!(chunk.get_biome(3, 70, 5), 260);
        assert_eq!(chunk.get_biome(15, 255, 15), 3 * 256 + 3 * 4 + 3);
    }

    #[test]
    fn test_biomes_other_length() {
        let chunk = Chunk::new(chunk(0, vec![], Some(vec![7; 100]))).unwrap();
        let no_biomes = Chunk::new(chunk_without_biomes()).unwrap();

        assert_eq!(chunk.get_biome(3, 70, 5), 0);
        assert_eq!(no_biomes.get_biome(0, 0, 0), 0);
    }

    fn chunk_without_biomes() -> CompoundTag {
        chunk(0, vec![], None)
    }

    #[test]
    fn test_biomes_negative_coordinates() {
        let chunk = Chunk::new(chunk(0, vec![], Some(vec![1; 256]))).unwrap();

        assert_eq!(chunk.get_biome(-40, 0, -40), 0);
    }

    #[test]
    fn test_from_bytes() {
        let mut indices = vec![0u64; 4096];
        indices[0] = 1;

        let root = chunk(100, vec![section(0, &["air", "stone"], pack(&indices, 4))], None);
        let chunk = Chunk::from_bytes(&encode("", &root)).unwrap();

        assert_eq!(chunk.last_update(), 100);
        assert_eq!(chunk.get_block(0, 0, 0), Some("stone"));
        assert_eq!(
            chunk.query(&PathSpec::compile("/Level/Sections[1]/Y").unwrap()),
            Some(Tag::Byte(0))
        );
    }

    #[test]
    fn test_parse_fields_is_repeatable() {
        let mut chunk = single_section_chunk(1, &["air", "stone"], vec![0x11; 256]);

        chunk.parse_fields().unwrap();

        assert_eq!(chunk.get_block(1, 16, 0), Some("stone"));
        assert_eq!(chunk.section(1).unwrap().palette(), &["air", "stone"]);
    }
}

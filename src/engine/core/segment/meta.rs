//! Segment meta file persistence (spec §4.B): the trie plus per-page column stats,
//! framed with the shared [`BinaryHeader`] and bincode-encoded, mirroring how the teacher
//! persists every other binary structure in this codebase.

use crate::engine::core::segment::trie::TrieNode;
use crate::engine::errors::SegmentError;
use crate::shared::storage_header::{ensure_header_if_new, open_and_header_offset, FileKind, MagicFile};
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub level: u32,
    pub first_row: u64,
    pub next_row: u64,
    pub trie: TrieNode,
}

struct SegmentMetaFile;

impl MagicFile for SegmentMetaFile {
    const MAGIC: [u8; 8] = FileKind::SegmentMeta.magic();
}

impl SegmentMeta {
    pub fn write_to(&self, path: &Path) -> Result<(), SegmentError> {
        let mut file = ensure_header_if_new(path, FileKind::SegmentMeta.magic())?;
        file.seek(SeekFrom::Start(0))?;
        file.set_len(0)?;
        SegmentMetaFile::write_header(&mut file)?;
        bincode::serialize_into(&mut file, self)?;
        file.flush()?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self, SegmentError> {
        let (mut file, offset) = open_and_header_offset(path, FileKind::SegmentMeta.magic())?;
        file.seek(SeekFrom::Start(offset as u64))?;
        let mut rest = Vec::new();
        file.read_to_end(&mut rest)?;
        bincode::deserialize(&rest).map_err(SegmentError::from)
    }
}

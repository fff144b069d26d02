//! Opens a segment's meta + data files for the merge planner and scan cursor (spec
//! §4.B/§4.F): resolves a leaf's `data_page_idx` to the actual rows without decoding pages
//! the planner already pruned.

use crate::engine::core::event::Event;
use crate::engine::core::segment::data_page::record_batch_to_events;
use crate::engine::core::segment::meta::SegmentMeta;
use crate::engine::core::segment::naming::SegmentId;
use crate::engine::errors::SegmentError;
use arrow_ipc::reader::FileReader;
use std::fs::File;
use std::path::Path;

pub struct SegmentReader {
    pub id: SegmentId,
    pub meta: SegmentMeta,
    data_path: std::path::PathBuf,
}

impl SegmentReader {
    pub fn open(table_dir: &Path, id: SegmentId) -> Result<Self, SegmentError> {
        let meta = SegmentMeta::read_from(&id.meta_path(table_dir))?;
        Ok(Self {
            id,
            meta,
            data_path: id.data_path(table_dir),
        })
    }

    /// Decodes one data page's worth of rows. Pages are read lazily and not cached here;
    /// the buffer pool (§5) is the caching layer above this.
    pub fn read_page(&self, page_idx: u32) -> Result<Vec<Event>, SegmentError> {
        let file = File::open(&self.data_path)?;
        let mut reader = FileReader::try_new(file, None)?;
        let batch = reader
            .nth(page_idx as usize)
            .ok_or(SegmentError::NoLeaf)??;
        record_batch_to_events(&batch)
    }
}

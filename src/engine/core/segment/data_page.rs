//! Arrow-IPC data pages (spec §4.B): the wire schema every segment's rows are stored in,
//! and the conversion to/from [`Event`] used by the writer, the scan cursor, and the
//! compactor.

use crate::engine::core::event::{Event, Op};
use crate::engine::core::iid::Iid;
use crate::engine::errors::SegmentError;
use arrow_array::builder::{FixedSizeBinaryBuilder, Int8Builder, Int64Builder, LargeStringBuilder};
use arrow_array::{Array, FixedSizeBinaryArray, Int8Array, Int64Array, LargeStringArray, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

const OP_PUT: i8 = 0;
const OP_DELETE: i8 = 1;
const OP_ERASE: i8 = 2;

pub fn page_schema() -> Schema {
    Schema::new(vec![
        Field::new("iid", DataType::FixedSizeBinary(16), false),
        Field::new("system_from", DataType::Int64, false),
        Field::new("op_tag", DataType::Int8, false),
        Field::new("doc_json", DataType::LargeUtf8, true),
        Field::new("valid_from", DataType::Int64, true),
        Field::new("valid_to", DataType::Int64, true),
        // Filled in by the compactor (§4.H) with the system-time this row's validity was
        // entirely superseded by; `null` until compacted, or if never superseded.
        Field::new("recency", DataType::Int64, true),
    ])
}

/// Encodes events already sorted `(iid asc, system_from desc)` (property 1) into one
/// Arrow-IPC-framed record batch. `recency` must be the same length as `events`, or empty
/// to leave every row's recency hint unset.
pub fn events_to_record_batch(
    events: &[Event],
    recency: &[Option<i64>],
) -> Result<RecordBatch, SegmentError> {
    let schema = Arc::new(page_schema());
    let mut iid_b = FixedSizeBinaryBuilder::new(16);
    let mut system_from_b = Int64Builder::with_capacity(events.len());
    let mut op_tag_b = Int8Builder::with_capacity(events.len());
    let mut doc_b = LargeStringBuilder::new();
    let mut valid_from_b = Int64Builder::with_capacity(events.len());
    let mut valid_to_b = Int64Builder::with_capacity(events.len());
    let mut recency_b = Int64Builder::with_capacity(events.len());

    for (i, event) in events.iter().enumerate() {
        iid_b.append_value(event.iid.0)?;
        system_from_b.append_value(event.system_from);
        recency_b.append_option(recency.get(i).copied().flatten());
        match &event.op {
            Op::Put {
                doc,
                valid_from,
                valid_to,
            } => {
                op_tag_b.append_value(OP_PUT);
                doc_b.append_value(doc.to_string());
                valid_from_b.append_value(*valid_from);
                valid_to_b.append_option(*valid_to);
            }
            Op::Delete {
                valid_from,
                valid_to,
            } => {
                op_tag_b.append_value(OP_DELETE);
                doc_b.append_null();
                valid_from_b.append_value(*valid_from);
                valid_to_b.append_option(*valid_to);
            }
            Op::Erase => {
                op_tag_b.append_value(OP_ERASE);
                doc_b.append_null();
                valid_from_b.append_null();
                valid_to_b.append_null();
            }
        }
    }

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(iid_b.finish()),
            Arc::new(system_from_b.finish()),
            Arc::new(op_tag_b.finish()),
            Arc::new(doc_b.finish()),
            Arc::new(valid_from_b.finish()),
            Arc::new(valid_to_b.finish()),
            Arc::new(recency_b.finish()),
        ],
    )
    .map_err(SegmentError::from)
}

/// Reads just the `recency` column, parallel to [`record_batch_to_events`]'s output.
pub fn record_batch_recency(batch: &RecordBatch) -> Result<Vec<Option<i64>>, SegmentError> {
    let col = batch
        .column(6)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or(SegmentError::BadHeader)?;
    Ok((0..batch.num_rows())
        .map(|row| if col.is_null(row) { None } else { Some(col.value(row)) })
        .collect())
}

/// Decodes a data page back into [`Event`] rows, preserving row order.
pub fn record_batch_to_events(batch: &RecordBatch) -> Result<Vec<Event>, SegmentError> {
    let iid_col = batch
        .column(0)
        .as_any()
        .downcast_ref::<FixedSizeBinaryArray>()
        .ok_or(SegmentError::BadHeader)?;
    let system_from_col = batch
        .column(1)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or(SegmentError::BadHeader)?;
    let op_tag_col = batch
        .column(2)
        .as_any()
        .downcast_ref::<Int8Array>()
        .ok_or(SegmentError::BadHeader)?;
    let doc_col = batch
        .column(3)
        .as_any()
        .downcast_ref::<LargeStringArray>()
        .ok_or(SegmentError::BadHeader)?;
    let valid_from_col = batch
        .column(4)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or(SegmentError::BadHeader)?;
    let valid_to_col = batch
        .column(5)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or(SegmentError::BadHeader)?;

    let mut events = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let mut raw = [0u8; 16];
        raw.copy_from_slice(iid_col.value(row));
        let iid = Iid(raw);
        let system_from = system_from_col.value(row);

        let op = match op_tag_col.value(row) {
            OP_PUT => Op::Put {
                doc: serde_json::from_str(doc_col.value(row))
                    .map_err(|e| SegmentError::InvalidName(e.to_string()))?,
                valid_from: valid_from_col.value(row),
                valid_to: if valid_to_col.is_null(row) {
                    None
                } else {
                    Some(valid_to_col.value(row))
                },
            },
            OP_DELETE => Op::Delete {
                valid_from: valid_from_col.value(row),
                valid_to: if valid_to_col.is_null(row) {
                    None
                } else {
                    Some(valid_to_col.value(row))
                },
            },
            _ => Op::Erase,
        };

        events.push(Event::new(iid, system_from, op));
    }
    Ok(events)
}

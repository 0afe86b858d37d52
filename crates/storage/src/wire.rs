// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk wire format for [`LogRecord`]s.
//!
//! Each record is written as:
//!
//! ```text
//! [u32 length][u8 tag][u64 step][u16 partition, tag 'O' only][serde_json payload]
//! ```
//!
//! `length` covers everything after itself (tag + step + partition, where
//! present + payload). The tag byte duplicates [`LogRecord::tag`] so a
//! reader can classify a record without deserializing the payload, and so a
//! corrupted payload can be skipped without losing track of the record
//! boundary. `OutputEmitted` records additionally duplicate their partition
//! index in the header, ahead of the payload, the same way: the header copy
//! is a classification/skip aid, the JSON payload remains the source of
//! truth reconstructed on read.

use fluxtask_core::LogRecord;
use std::io::{self, Read, Write};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed record payload: {0}")]
    Malformed(String),
}

pub fn encode(record: &LogRecord) -> Result<Vec<u8>, WireError> {
    let payload = serde_json::to_vec(record)
        .map_err(|e| WireError::Malformed(format!("could not serialize record: {e}")))?;
    let mut body = Vec::with_capacity(1 + 8 + 2 + payload.len());
    body.push(record.tag());
    body.extend_from_slice(&record.step().get().to_be_bytes());
    if let LogRecord::OutputEmitted { partition, .. } = record {
        body.extend_from_slice(&partition.to_be_bytes());
    }
    body.extend_from_slice(&payload);

    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn write_record<W: Write>(w: &mut W, record: &LogRecord) -> Result<(), WireError> {
    w.write_all(&encode(record)?)?;
    Ok(())
}

/// Read one record from `r`. Returns `Ok(None)` at a clean end-of-stream.
/// Returns `Err` on a truncated length prefix or a length that can't fit the
/// bytes actually present — the caller treats this as "stop reading, the
/// tail is corrupt" rather than propagating a hard failure for bytes that
/// were never fully durable.
pub fn read_record<R: Read>(r: &mut R) -> Result<Option<LogRecord>, WireError> {
    let mut len_buf = [0u8; 4];
    match read_exact_or_eof(r, &mut len_buf)? {
        false => return Ok(None),
        true => {}
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len < 9 {
        return Err(WireError::Malformed(format!("record length {len} too short for header")));
    }
    let mut body = vec![0u8; len];
    if !read_exact_or_eof(r, &mut body)? {
        return Err(WireError::Malformed("truncated record body".into()));
    }
    let tag = body[0];
    let _step = u64::from_be_bytes(body[1..9].try_into().unwrap_or([0; 8]));
    let payload_start = if tag == b'O' { 11 } else { 9 };
    if body.len() < payload_start {
        return Err(WireError::Malformed("record too short for its tag's header".into()));
    }
    let record: LogRecord = serde_json::from_slice(&body[payload_start..])
        .map_err(|e| WireError::Malformed(format!("bad payload json: {e}")))?;
    Ok(Some(record))
}

/// Like `Read::read_exact` but reports a clean EOF (zero bytes read before
/// any partial fill) as `Ok(false)` instead of an error, distinguishing it
/// from a truncated read mid-record.
fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => {
                return if filled == 0 {
                    Ok(false)
                } else {
                    Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated record"))
                };
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;

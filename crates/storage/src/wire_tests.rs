// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fluxtask_core::StepNumber;
use std::io::Cursor;

fn sample() -> LogRecord {
    LogRecord::CheckpointBoundary { step: StepNumber::new(4), checkpoint_id: 9 }
}

#[test]
fn round_trips_a_single_record() {
    let bytes = encode(&sample()).unwrap();
    let mut cursor = Cursor::new(bytes);
    let decoded = read_record(&mut cursor).unwrap().unwrap();
    assert_eq!(decoded, sample());
}

#[test]
fn round_trips_an_output_emitted_record_with_its_partition_header() {
    let rec = LogRecord::OutputEmitted { step: StepNumber::new(7), partition: 42, payload: vec![9, 8, 7] };
    let bytes = encode(&rec).unwrap();
    let mut cursor = Cursor::new(bytes);
    let decoded = read_record(&mut cursor).unwrap().unwrap();
    assert_eq!(decoded, rec);
}

#[test]
fn empty_stream_returns_none() {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    assert!(read_record(&mut cursor).unwrap().is_none());
}

#[test]
fn reads_multiple_records_in_order() {
    let a = LogRecord::Clear { step: StepNumber::new(1), checkpoint_id: None };
    let b = LogRecord::Clear { step: StepNumber::new(2), checkpoint_id: Some(1) };
    let mut buf = Vec::new();
    write_record(&mut buf, &a).unwrap();
    write_record(&mut buf, &b).unwrap();

    let mut cursor = Cursor::new(buf);
    assert_eq!(read_record(&mut cursor).unwrap().unwrap(), a);
    assert_eq!(read_record(&mut cursor).unwrap().unwrap(), b);
    assert!(read_record(&mut cursor).unwrap().is_none());
}

#[test]
fn truncated_tail_after_valid_records_errors_instead_of_panicking() {
    let a = sample();
    let mut buf = Vec::new();
    write_record(&mut buf, &a).unwrap();
    buf.extend_from_slice(&[0, 0, 0, 40]); // length prefix promising 40 more bytes we never write
    let mut cursor = Cursor::new(buf);
    assert_eq!(read_record(&mut cursor).unwrap().unwrap(), a);
    assert!(read_record(&mut cursor).is_err());
}

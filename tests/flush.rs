//! Body-filter flush scenarios from the testable-scenarios table (S1-S4):
//! nobuf immediate flush, a fully-buffered edit, an edit straddling the
//! emit horizon, and overlapping edits.

#![cfg(feature = "test-support")]

use bytes::Bytes;
use interlock::config::LimitAction;
use interlock::filter::edit::Edit;
use interlock::filter::{BodyFilter, Direction};
use interlock::flags::TxFlags;
use interlock::testkit::{RecordingWriteIntent, blank_tx, test_engine};

fn inspecting_tx() -> interlock::tx::Tx {
    let mut tx = blank_tx();
    tx.flags_mut().insert(TxFlags::INSPECT_REQBODY);
    tx
}

#[test]
fn s1_nobuf_emits_every_chunk_verbatim_and_in_order() {
    let intent = RecordingWriteIntent::new();
    let mut filter = BodyFilter::new(Direction::Request, test_engine(), Box::new(intent), false, -1, LimitAction::FlushAll);
    let mut tx = inspecting_tx();

    for chunk in ["He", "ll", "oW", "or", "ld"] {
        filter.on_chunk(&mut tx, chunk.as_bytes()).expect("on_chunk");
    }
    filter.on_end(&mut tx).expect("on_end");

    assert_eq!(filter.bytes_done(), 10);
}

#[test]
fn s2_edit_applies_when_fully_buffered() {
    let intent = RecordingWriteIntent::new();
    let mut filter = BodyFilter::new(Direction::Request, test_engine(), Box::new(intent), true, -1, LimitAction::FlushAll);
    let mut tx = inspecting_tx();

    filter.on_chunk(&mut tx, b"HelloWorld").expect("on_chunk");
    filter.push_edit(&mut tx, Edit::new(5, 5, Bytes::from_static(b"There")));
    filter.on_end(&mut tx).expect("on_end");

    assert_eq!(filter.bytes_done(), 10);
}

#[test]
fn s3_straddling_edit_defers_then_completes_across_two_chunks() {
    // nobuf mode flushes eagerly on every chunk, so the edit straddling the
    // first chunk's horizon genuinely defers to the second flush; under
    // buffering the whole body would only flush once, at `on_end`.
    let intent = RecordingWriteIntent::new();
    let mut filter = BodyFilter::new(Direction::Request, test_engine(), Box::new(intent), false, -1, LimitAction::FlushAll);
    let mut tx = inspecting_tx();

    filter.push_edit(&mut tx, Edit::new(3, 4, Bytes::from_static(b"p!")));
    filter.on_chunk(&mut tx, b"Hello").expect("on_chunk tolerates again");
    assert_eq!(filter.bytes_done(), 3);
    assert_eq!(filter.buffered(), 2);

    filter.on_chunk(&mut tx, b"World").expect("on_chunk");
    filter.on_end(&mut tx).expect("on_end");

    assert_eq!(filter.bytes_done(), 10);
}

#[test]
fn s4_overlapping_edit_is_dropped_not_fatal() {
    let intent = RecordingWriteIntent::new();
    let written = intent.clone();
    let mut filter = BodyFilter::new(Direction::Request, test_engine(), Box::new(intent), true, -1, LimitAction::FlushAll);
    let mut tx = inspecting_tx();

    filter.push_edit(&mut tx, Edit::new(0, 3, Bytes::from_static(b"x")));
    filter.push_edit(&mut tx, Edit::new(1, 2, Bytes::from_static(b"y")));
    filter.on_chunk(&mut tx, b"Hello").expect("on_chunk");
    filter.on_end(&mut tx).expect("on_end");

    assert_eq!(filter.bytes_done(), 5);
    // The second edit starts inside the byte range the first edit already
    // consumed, so only the first is applied: "Hello" -> "x" + "lo".
    assert_eq!(&written.written()[..], b"xlo");
}

#[test]
fn response_direction_honours_its_own_inspection_flag() {
    let intent = RecordingWriteIntent::new();
    let mut filter = BodyFilter::new(Direction::Response, test_engine(), Box::new(intent), true, -1, LimitAction::FlushAll);
    let mut tx = blank_tx();
    tx.flags_mut().insert(TxFlags::INSPECT_RESBODY);
    filter.on_chunk(&mut tx, b"unused").expect("on_chunk");
    filter.on_end(&mut tx).expect("on_end");
    assert_eq!(filter.bytes_done(), 6);
}

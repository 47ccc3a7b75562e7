//!
//! Chunked LOB Transfer
//!
//! LOB payloads move through a transfer handle negotiated by `set_lob` or
//! `get_lob`, in chunks no larger than the engine's transfer unit. The
//! handle lives on this function's stack for the duration of the chunk
//! loop and is dropped with it.
//!
//! Write path:
//! - a `None` payload sets the parameter to SQL null without negotiating
//! - the total length is declared up front
//! - chunks are written while bytes remain; the first failing chunk's
//!   status is returned unchanged and the rest of the payload abandoned
//! - character payloads are never split inside a UTF-8 sequence
//!
//! Read path:
//! - the reported length sizes a single buffer allocated before the loop
//!   (character LOBs report characters, so their buffer is over-provisioned
//!   by `TransferPolicy::nclob_expansion`)
//! - chunks are read at a running offset; a chunk call returning more than
//!   it was asked for means more data follows
//! - on a failing chunk the buffer is dropped and the status propagated
//!
//! Partially written LOBs are left as the engine leaves them. Rolling back
//! the transaction is the caller's recovery path.
//!

use tracing::{debug, trace, warn};

use crate::alloc::BufferAllocator;
use crate::config::TransferPolicy;
use crate::engine::{LobApi, NullApi};
pub use crate::engine::LobKind;
use crate::handle::{LobHandle, StatementHandle};
use crate::probe::Growth;
use crate::status::{Fetched, Status};

impl LobKind {
    fn growth(self, policy: &TransferPolicy) -> Growth {
        match self {
            LobKind::Blob => Growth::BINARY,
            LobKind::Nclob => Growth::text_with_expansion(policy.nclob_expansion),
        }
    }
}

pub fn write_blob<E>(
    engine: &mut E,
    policy: &TransferPolicy,
    statement: StatementHandle,
    index: i16,
    payload: Option<&[u8]>,
) -> Status
where
    E: LobApi + NullApi + ?Sized,
{
    let Some(data) = payload else {
        return Status::from_code(engine.set_null(statement, index));
    };
    let unit = policy.max_write_chunk;
    write_chunks(
        engine,
        statement,
        index,
        LobKind::Blob,
        data,
        |rest| rest.len().min(unit),
        |engine, lob, chunk| engine.set_blob_data(lob, chunk),
    )
}

pub fn write_nclob<E>(
    engine: &mut E,
    policy: &TransferPolicy,
    statement: StatementHandle,
    index: i16,
    payload: Option<&str>,
) -> Status
where
    E: LobApi + NullApi + ?Sized,
{
    let Some(text) = payload else {
        return Status::from_code(engine.set_null(statement, index));
    };
    let unit = policy.max_write_chunk;
    write_chunks(
        engine,
        statement,
        index,
        LobKind::Nclob,
        text.as_bytes(),
        |rest| utf8_chunk_end(rest, unit),
        |engine, lob, chunk| engine.set_nclob_data(lob, chunk),
    )
}

fn write_chunks<E, S, P>(
    engine: &mut E,
    statement: StatementHandle,
    index: i16,
    kind: LobKind,
    data: &[u8],
    next_chunk: S,
    mut put: P,
) -> Status
where
    E: LobApi + ?Sized,
    S: Fn(&[u8]) -> usize,
    P: FnMut(&mut E, &mut LobHandle, &[u8]) -> i32,
{
    let mut lob = LobHandle::default();
    let rc = engine.set_lob(statement, index, data.len(), kind, &mut lob);
    if rc < 0 {
        debug!(%statement, index, rc, "LOB write negotiation failed");
        return Status::from_code(rc);
    }
    debug!(%statement, index, length = data.len(), "LOB write negotiated");

    let mut remaining = data;
    let mut chunk = 0usize;
    while !remaining.is_empty() {
        let n = next_chunk(remaining);
        chunk += 1;
        let rc = put(engine, &mut lob, &remaining[..n]);
        trace!(chunk, bytes = n, rc, "LOB write chunk");
        if rc < 0 {
            debug!(chunk, rc, abandoned = remaining.len() - n, "LOB write chunk failed");
            return Status::from_code(rc);
        }
        remaining = &remaining[n..];
    }
    Status::OK
}

/// Largest prefix of `bytes` no longer than `limit` that ends on a UTF-8
/// boundary. A limit smaller than the first character yields that whole
/// character.
fn utf8_chunk_end(bytes: &[u8], limit: usize) -> usize {
    if bytes.len() <= limit {
        return bytes.len();
    }
    let is_boundary = |i: usize| i >= bytes.len() || (bytes[i] & 0xC0) != 0x80;
    let mut end = limit;
    while end > 0 && !is_boundary(end) {
        end -= 1;
    }
    if end == 0 {
        end = limit.max(1);
        while !is_boundary(end) {
            end += 1;
        }
    }
    end
}

pub fn read_blob<E, A>(
    engine: &mut E,
    alloc: &A,
    policy: &TransferPolicy,
    statement: StatementHandle,
    index: i16,
) -> Fetched<Vec<u8>>
where
    E: LobApi + ?Sized,
    A: BufferAllocator + ?Sized,
{
    read_chunks(engine, alloc, policy, statement, index, LobKind::Blob, |engine, lob, buf| {
        engine.get_blob_data(lob, buf)
    })
}

pub fn read_nclob<E, A>(
    engine: &mut E,
    alloc: &A,
    policy: &TransferPolicy,
    statement: StatementHandle,
    index: i16,
) -> Fetched<String>
where
    E: LobApi + ?Sized,
    A: BufferAllocator + ?Sized,
{
    let fetched = read_chunks(engine, alloc, policy, statement, index, LobKind::Nclob, |engine, lob, buf| {
        engine.get_nclob_data(lob, buf)
    });
    let Some(bytes) = fetched.value else {
        return Fetched::failed(fetched.status);
    };
    match String::from_utf8(bytes) {
        Ok(text) => Fetched::ok(text),
        Err(_) => Fetched::failed(Status::DATA_CONVERSION),
    }
}

fn read_chunks<E, A, G>(
    engine: &mut E,
    alloc: &A,
    policy: &TransferPolicy,
    statement: StatementHandle,
    index: i16,
    kind: LobKind,
    mut get: G,
) -> Fetched<Vec<u8>>
where
    E: LobApi + ?Sized,
    A: BufferAllocator + ?Sized,
    G: FnMut(&mut E, &mut LobHandle, &mut [u8]) -> i32,
{
    let mut lob = LobHandle::default();
    let mut length = 0usize;
    let rc = engine.get_lob(statement, index, &mut length, &mut lob);
    if rc < 0 {
        debug!(%statement, index, rc, "LOB read negotiation failed");
        return Fetched::failed(rc);
    }
    if length == 0 {
        return Fetched::ok(Vec::new());
    }

    let growth = kind.growth(policy);
    let Some(capacity) = growth.capacity_for(length) else {
        return Fetched::failed(Status::OUT_OF_MEMORY);
    };
    let Some(mut buf) = alloc.allocate(capacity) else {
        return Fetched::failed(Status::OUT_OF_MEMORY);
    };
    debug!(%statement, index, length, capacity, ?kind, "LOB read negotiated");

    let limit = capacity - growth.terminator;
    let mut offset = 0usize;
    let mut exhausted = false;
    let mut chunk = 0usize;
    while offset < limit {
        let part = policy.max_read_chunk.min(limit - offset);
        chunk += 1;
        let rc = get(engine, &mut lob, &mut buf[offset..offset + part]);
        trace!(chunk, offset, bytes = part, rc, "LOB read chunk");
        if rc < 0 {
            debug!(chunk, rc, "LOB read chunk failed");
            return Fetched::failed(rc);
        }
        let remaining = rc as usize;
        if remaining > part {
            offset += part;
            continue;
        }
        offset += remaining;
        exhausted = true;
        break;
    }

    if !exhausted && kind == LobKind::Nclob {
        warn!(
            length,
            capacity,
            expansion = policy.nclob_expansion,
            "character LOB larger than its expanded buffer"
        );
        return Fetched::failed(Status::DATA_CONVERSION);
    }
    buf.truncate(offset);
    Fetched::ok(buf)
}

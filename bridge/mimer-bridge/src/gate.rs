//!
//! Null-sentinel gate.
//!
//! Every typed fetch is preceded by the engine's null predicate. A null
//! target returns the sentinel response (status 0, no payload) and the
//! typed accessor is never called. The predicate and the fetch are two
//! separate engine calls, so the cursor must not move between them.
//!

use crate::engine::NullApi;
use crate::handle::StatementHandle;
use crate::status::Fetched;

pub fn gated<E, T, F>(engine: &mut E, statement: StatementHandle, index: i16, fetch: F) -> Fetched<T>
where
    E: NullApi + ?Sized,
    F: FnOnce(&mut E) -> Fetched<T>,
{
    if engine.is_null(statement, index) > 0 {
        return Fetched::null();
    }
    fetch(engine)
}

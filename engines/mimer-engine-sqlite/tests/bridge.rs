///
/// # End-to-end tests: Bridge over the SQLite reference engine
///
/// Covers the buffer probe at and around the inline capacity, chunked LOB
/// transfer at transfer-unit boundaries, the null gate, allocation-failure
/// injection, deferred bind errors, transactions, batches and row value
/// dispatch.
///

use tempfile::TempDir;

use mimer_bridge::{
    Bridge, CursorMode, ErrorClass, FaultInjector, FeatureLevel, SessionHandle, Status,
    StatementHandle, TransferPolicy, Value, INLINE_CAPACITY,
};
use mimer_engine_sqlite::SqliteEngine;

const UNIT: usize = 64;

type TestBridge = Bridge<SqliteEngine, FaultInjector>;

fn small_units() -> TransferPolicy {
    TransferPolicy {
        max_write_chunk: UNIT,
        max_read_chunk: UNIT,
        nclob_expansion: 4,
    }
}

fn open(engine: SqliteEngine, policy: TransferPolicy) -> (TestBridge, SessionHandle) {
    let mut bridge = Bridge::with_allocator(engine, FaultInjector::new(), policy);
    let session = bridge
        .begin_session("", "SYSADM", "")
        .value
        .expect("Failed to open session");
    (bridge, session)
}

fn exec(bridge: &mut TestBridge, session: SessionHandle, sql: &str) -> Status {
    let status = bridge.execute_statement(session, sql);
    assert!(status.is_ok(), "{} failed with {}", sql, status);
    status
}

fn prepare(bridge: &mut TestBridge, session: SessionHandle, sql: &str) -> StatementHandle {
    let fetched = bridge.begin_statement(session, sql, CursorMode::ForwardOnly);
    assert_eq!(fetched.status, Status::OK, "prepare {}", sql);
    fetched.value.expect("statement handle")
}

/// Opens a cursor over `sql` bound to `id` and positions it on the first row.
fn select_by_id(bridge: &mut TestBridge, session: SessionHandle, sql: &str, id: i32) -> StatementHandle {
    let st = prepare(bridge, session, sql);
    assert_eq!(bridge.set_int32(st, 1, id), Status::OK);
    assert_eq!(bridge.open_cursor(st), Status::OK);
    assert_eq!(bridge.fetch(st).value, Some(true));
    st
}

fn count_rows(bridge: &mut TestBridge, session: SessionHandle, table: &str) -> i64 {
    let st = prepare(bridge, session, &format!("SELECT COUNT(*) FROM {}", table));
    bridge.open_cursor(st);
    bridge.fetch(st);
    let n = bridge.get_int64(st, 1).value.expect("count");
    bridge.end_statement(st);
    n
}

#[test]
fn test_strings_around_inline_capacity() {
    let (mut bridge, s) = open(SqliteEngine::new(), TransferPolicy::default());
    exec(&mut bridge, s, "CREATE TABLE names (id INTEGER, v VARCHAR(5000))");

    let lengths = [0, 1, INLINE_CAPACITY - 1, INLINE_CAPACITY, INLINE_CAPACITY + 1, 4000];
    for (id, len) in lengths.iter().enumerate() {
        let value: String = (0..*len).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        let ins = prepare(&mut bridge, s, "INSERT INTO names VALUES (?, ?)");
        bridge.set_int32(ins, 1, id as i32);
        bridge.set_string(ins, 2, &value);
        assert_eq!(bridge.execute(ins).row_count(), Some(1));
        bridge.end_statement(ins);

        let st = select_by_id(&mut bridge, s, "SELECT v FROM names WHERE id = ?", id as i32);
        let fetched = bridge.get_string(st, 1).value.expect("string value");
        assert_eq!(fetched.as_str(), value, "length {}", len);
        assert_eq!(fetched.is_inline(), *len < INLINE_CAPACITY, "length {}", len);
        bridge.end_statement(st);
    }
    assert_eq!(bridge.allocator().granted(), 3);
}

#[test]
fn test_binary_values_through_probe() {
    let (mut bridge, s) = open(SqliteEngine::new(), TransferPolicy::default());
    exec(&mut bridge, s, "CREATE TABLE bins (id INTEGER, b VARBINARY(1000))");

    for (id, len) in [3usize, 127, 128, 700].iter().enumerate() {
        let data: Vec<u8> = (0..*len).map(|i| (i * 7 % 256) as u8).collect();
        let ins = prepare(&mut bridge, s, "INSERT INTO bins VALUES (?, ?)");
        bridge.set_int32(ins, 1, id as i32);
        bridge.set_binary(ins, 2, &data);
        bridge.execute(ins);

        let st = select_by_id(&mut bridge, s, "SELECT b FROM bins WHERE id = ?", id as i32);
        let fetched = bridge.get_binary(st, 1).value.expect("binary value");
        assert_eq!(fetched.as_slice(), data.as_slice());
    }
}

#[test]
fn test_blob_round_trip_at_unit_boundaries() {
    let (mut bridge, s) = open(SqliteEngine::new(), small_units());
    exec(&mut bridge, s, "CREATE TABLE docs (id INTEGER, body BLOB)");

    for (id, len) in [0, 1, UNIT - 1, UNIT, UNIT + 1, 5 * UNIT + 17].iter().enumerate() {
        let data: Vec<u8> = (0..*len).map(|i| (i * 13 % 251) as u8).collect();
        let ins = prepare(&mut bridge, s, "INSERT INTO docs VALUES (?, ?)");
        bridge.set_int32(ins, 1, id as i32);
        assert_eq!(bridge.set_blob(ins, 2, Some(data.as_slice())), Status::OK, "write {}", len);
        assert_eq!(bridge.execute(ins).row_count(), Some(1));
        bridge.end_statement(ins);

        let st = select_by_id(&mut bridge, s, "SELECT body FROM docs WHERE id = ?", id as i32);
        let back = bridge.get_blob(st, 1);
        assert_eq!(back.status, Status::OK);
        assert_eq!(back.value.as_deref(), Some(data.as_slice()), "round trip {}", len);
        bridge.end_statement(st);
    }
    assert_eq!(bridge.engine().lob_count(), 0);
}

#[test]
fn test_nclob_round_trip() {
    let (mut bridge, s) = open(SqliteEngine::new(), small_units());
    exec(&mut bridge, s, "CREATE TABLE notes (id INTEGER, body NCLOB)");

    let text = "Räksmörgås €5 🦀 ".repeat(40);
    let ins = prepare(&mut bridge, s, "INSERT INTO notes VALUES (?, ?)");
    bridge.set_int32(ins, 1, 1);
    assert_eq!(bridge.set_nclob(ins, 2, Some(text.as_str())), Status::OK);
    bridge.execute(ins);

    let st = select_by_id(&mut bridge, s, "SELECT body FROM notes WHERE id = ?", 1);
    assert_eq!(bridge.get_nclob(st, 1).value.as_deref(), Some(text.as_str()));
    assert_eq!(
        bridge.get_value(st, 1).value,
        Some(Value::Text(text.clone()))
    );
}

#[test]
fn test_null_sentinel_for_every_accessor() {
    let (mut bridge, s) = open(SqliteEngine::new(), small_units());
    exec(
        &mut bridge,
        s,
        "CREATE TABLE n (id INTEGER, i INTEGER, b BLOB, c NCLOB, t VARCHAR(10), u UUID)",
    );
    let ins = prepare(&mut bridge, s, "INSERT INTO n VALUES (?, ?, ?, ?, ?, ?)");
    bridge.set_int32(ins, 1, 1);
    bridge.set_null(ins, 2);
    assert_eq!(bridge.set_blob(ins, 3, None), Status::OK);
    assert_eq!(bridge.set_nclob(ins, 4, None), Status::OK);
    bridge.set_null(ins, 5);
    bridge.set_null(ins, 6);
    assert_eq!(bridge.execute(ins).row_count(), Some(1));

    let st = select_by_id(&mut bridge, s, "SELECT i, b, c, t, u FROM n WHERE id = ?", 1);
    assert!(bridge.get_int32(st, 1).is_null());
    assert!(bridge.get_int64(st, 1).is_null());
    assert!(bridge.get_double(st, 1).is_null());
    assert!(bridge.get_float(st, 1).is_null());
    assert!(bridge.get_boolean(st, 1).is_null());
    assert!(bridge.get_blob(st, 2).is_null());
    assert!(bridge.get_nclob(st, 3).is_null());
    assert!(bridge.get_string(st, 4).is_null());
    assert!(bridge.get_binary(st, 4).is_null());
    assert!(bridge.get_uuid(st, 5).is_null());
    assert_eq!(bridge.is_null(st, 5).value, Some(true));
    assert_eq!(bridge.get_value(st, 2).value, Some(Value::Null));
    assert_eq!(bridge.engine().lob_count(), 0);
}

#[test]
fn test_allocation_failure_injection() {
    let (mut bridge, s) = open(SqliteEngine::new(), small_units());
    exec(&mut bridge, s, "CREATE TABLE big (id INTEGER, v VARCHAR(1000), b BLOB)");
    let long = "z".repeat(600);
    let ins = prepare(&mut bridge, s, "INSERT INTO big VALUES (?, ?, ?)");
    bridge.set_int32(ins, 1, 1);
    bridge.set_string(ins, 2, &long);
    bridge.set_blob(ins, 3, Some(&[5u8; 300][..]));
    bridge.execute(ins);

    let st = select_by_id(&mut bridge, s, "SELECT v, b, id FROM big WHERE id = ?", 1);
    assert!(!bridge.allocator().set_failing(true));

    let fetched = bridge.get_string(st, 1);
    assert_eq!(fetched.status, Status::OUT_OF_MEMORY);
    assert!(fetched.value.is_none());
    let fetched = bridge.get_blob(st, 2);
    assert_eq!(fetched.status, Status::OUT_OF_MEMORY);
    assert!(fetched.value.is_none());
    assert_eq!(bridge.get_int32(st, 3).value, Some(1));
    assert_eq!(bridge.allocator().denied(), 2);

    // reads abandoned after negotiation do not pile up in the engine
    for _ in 0..5 {
        assert_eq!(bridge.get_blob(st, 2).status, Status::OUT_OF_MEMORY);
    }
    assert_eq!(bridge.engine().lob_count(), 1);
    assert_eq!(bridge.get_int32(st, 3).value, Some(1));
    assert_eq!(bridge.engine().lob_count(), 0);
    assert_eq!(bridge.get_blob(st, 2).status, Status::OUT_OF_MEMORY);
    assert_eq!(bridge.fetch(st).value, Some(false));
    assert_eq!(bridge.engine().lob_count(), 0);

    let st = select_by_id(&mut bridge, s, "SELECT v, b, id FROM big WHERE id = ?", 1);
    assert!(bridge.allocator().set_failing(false));
    assert_eq!(bridge.get_string(st, 1).value.expect("string").len(), 600);
    assert_eq!(bridge.get_blob(st, 2).value, Some(vec![5u8; 300]));
    assert_eq!(bridge.engine().lob_count(), 0);
}

#[test]
fn test_empty_lobs_keep_their_type() {
    let (mut bridge, s) = open(SqliteEngine::new(), small_units());
    exec(&mut bridge, s, "CREATE TABLE e (id INTEGER, b BLOB, c NCLOB)");
    let ins = prepare(&mut bridge, s, "INSERT INTO e VALUES (?, ?, ?)");
    bridge.set_int32(ins, 1, 1);
    assert_eq!(bridge.set_blob(ins, 2, Some(&[][..])), Status::OK);
    assert_eq!(bridge.set_nclob(ins, 3, Some("")), Status::OK);
    assert_eq!(bridge.execute(ins).row_count(), Some(1));

    let st = select_by_id(&mut bridge, s, "SELECT b, c FROM e WHERE id = ?", 1);
    assert_eq!(bridge.get_blob(st, 1).value, Some(Vec::new()));
    assert_eq!(bridge.get_nclob(st, 2).value.as_deref(), Some(""));
    assert_eq!(bridge.get_value(st, 2).value, Some(Value::Text(String::new())));
    assert_eq!(bridge.engine().lob_count(), 0);

    let st = select_by_id(&mut bridge, s, "SELECT typeof(b), typeof(c) FROM e WHERE id = ?", 1);
    assert_eq!(bridge.get_string(st, 1).value.expect("blob type").as_str(), "blob");
    assert_eq!(bridge.get_string(st, 2).value.expect("nclob type").as_str(), "text");
}

#[test]
fn test_uuid_binding_and_deferred_error() {
    let (mut bridge, s) = open(SqliteEngine::new(), TransferPolicy::default());
    exec(&mut bridge, s, "CREATE TABLE ids (id INTEGER, u UUID)");

    let ins = prepare(&mut bridge, s, "INSERT INTO ids VALUES (?, ?)");
    bridge.set_int32(ins, 1, 1);
    assert_eq!(bridge.set_uuid(ins, 2, &[1, 2, 3]), Status::DATA_CONVERSION);
    assert_eq!(bridge.execute(ins), Status::DATA_CONVERSION);
    assert_eq!(count_rows(&mut bridge, s, "ids"), 0);

    let id = uuid::Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
    bridge.set_int32(ins, 1, 1);
    assert_eq!(bridge.set_uuid(ins, 2, &[9; 15]), Status::DATA_CONVERSION);
    assert_eq!(bridge.set_uuid(ins, 2, id.as_bytes()), Status::OK);
    assert_eq!(bridge.execute(ins).row_count(), Some(1));

    let st = select_by_id(&mut bridge, s, "SELECT u FROM ids WHERE id = ?", 1);
    assert_eq!(bridge.get_uuid(st, 1).value, Some(id));
    assert_eq!(bridge.get_value(st, 1).value, Some(Value::Uuid(id)));
}

#[test]
fn test_transactions_persist_across_sessions() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let (mut bridge, s) = open(SqliteEngine::with_root(dir.path()), TransferPolicy::default());
    bridge.end_session(s);

    let s = bridge.begin_session("bankdb", "SYSADM", "").value.expect("session");
    exec(&mut bridge, s, "CREATE TABLE accounts (id INTEGER, balance DOUBLE)");

    assert_eq!(bridge.begin_transaction(s), Status::OK);
    exec(&mut bridge, s, "INSERT INTO accounts VALUES (1, 10.0)");
    assert_eq!(bridge.rollback(s), Status::OK);
    assert_eq!(count_rows(&mut bridge, s, "accounts"), 0);

    assert_eq!(bridge.begin_transaction(s), Status::OK);
    exec(&mut bridge, s, "INSERT INTO accounts VALUES (1, 10.0)");
    let st = prepare(&mut bridge, s, "SELECT id FROM accounts");
    bridge.open_cursor(st);
    assert_eq!(bridge.commit(s), Status::OK);
    assert_eq!(bridge.fetch(st).status.code(), -14101);
    assert_eq!(bridge.end_session(s), Status::OK);
    assert!(dir.path().join("bankdb.db").exists());

    let s = bridge.begin_session("bankdb", "SYSADM", "").value.expect("session");
    assert_eq!(count_rows(&mut bridge, s, "accounts"), 1);
    assert_eq!(bridge.commit(s).class(), ErrorClass::Operational);
}

#[test]
fn test_batched_execution() {
    let (mut bridge, s) = open(SqliteEngine::new(), TransferPolicy::default());
    exec(&mut bridge, s, "CREATE TABLE t (id INTEGER, name VARCHAR(20))");

    let ins = prepare(&mut bridge, s, "INSERT INTO t VALUES (:id, :name)");
    assert_eq!(bridge.parameter_count(ins).value, Some(2));
    assert_eq!(bridge.parameter_name(ins, 2).value.expect("name"), "name");

    let rows = [(1, "one"), (2, "two"), (3, "three")];
    for (i, (id, name)) in rows.iter().enumerate() {
        bridge.set_int32(ins, 1, *id);
        bridge.set_string(ins, 2, name);
        if i < rows.len() - 1 {
            assert_eq!(bridge.add_batch(ins), Status::OK);
        }
    }
    assert_eq!(bridge.execute(ins).row_count(), Some(3));
    assert_eq!(count_rows(&mut bridge, s, "t"), 3);
}

#[test]
fn test_failed_batch_applies_nothing() {
    let (mut bridge, s) = open(SqliteEngine::new(), TransferPolicy::default());
    exec(&mut bridge, s, "CREATE TABLE t (id INTEGER PRIMARY KEY)");

    let ins = prepare(&mut bridge, s, "INSERT INTO t VALUES (?)");
    for id in [1, 2] {
        bridge.set_int32(ins, 1, id);
        bridge.add_batch(ins);
    }
    bridge.set_int32(ins, 1, 1);
    let status = bridge.execute(ins);
    assert_eq!(status.class(), ErrorClass::Integrity);
    assert_eq!(count_rows(&mut bridge, s, "t"), 0);

    let err = bridge.last_error(ins).value.expect("last error");
    assert_eq!(err.code, status.code());
    assert!(err.message.contains("UNIQUE"), "{}", err.message);
}

#[test]
fn test_engine_errors_reach_the_host() {
    let (mut bridge, s) = open(SqliteEngine::new(), TransferPolicy::default());

    let fetched = bridge.begin_statement(s, "SELEC nonsense", CursorMode::ForwardOnly);
    assert!(fetched.value.is_none());
    let err = fetched.into_result().unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"Engine error -12101 (ProgrammingError)");

    let last = bridge.last_error(s).value.expect("last error");
    assert_eq!(last.code, -12101);
    assert!(last.message.contains("syntax error"), "{}", last.message);
    assert!(last.message.len() < 128);
}

#[test]
fn test_row_value_dispatch() {
    let (mut bridge, s) = open(SqliteEngine::new(), TransferPolicy::default());
    exec(
        &mut bridge,
        s,
        "CREATE TABLE accounts (id INTEGER, name VARCHAR(20), balance DOUBLE, active BOOLEAN, photo VARBINARY(4))",
    );
    exec(&mut bridge, s, "INSERT INTO accounts VALUES (1, 'alice', 100.5, 1, x'cafe')");
    exec(&mut bridge, s, "INSERT INTO accounts VALUES (2, 'bob', 0.0, 0, NULL)");

    let st = prepare(&mut bridge, s, "SELECT id, name, balance, active, photo FROM accounts ORDER BY id");
    let columns = bridge.column_count(st).value.expect("column count");
    assert_eq!(bridge.column_name(st, 4).value.expect("column name"), "active");
    bridge.open_cursor(st);

    let mut lines = Vec::new();
    while bridge.fetch(st).value == Some(true) {
        let row: Vec<String> = (1..=columns as i16)
            .map(|i| bridge.get_value(st, i).value.expect("value").to_string())
            .collect();
        lines.push(row.join(" | "));
    }
    insta::assert_snapshot!(lines.join("\n"), @r"
    1 | alice | 100.5 | true | x'cafe'
    2 | bob | 0 | false | NULL
    ");
}

#[test]
fn test_version_negotiation() {
    let (bridge, _) = open(SqliteEngine::new(), TransferPolicy::default());
    assert!(bridge.api_version_string().starts_with("11.0.5B reference/sqlite"));
    let version = bridge.negotiate_version().expect("supported version");
    assert_eq!(version.feature_level(), Some(FeatureLevel::Current));
}

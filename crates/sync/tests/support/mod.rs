//! In-process stand-in for the hosted database service.
//!
//! Speaks just enough of the row API for the engine: filtered reads,
//! insert/upsert/patch/delete keyed on the primary key, a health endpoint,
//! and a server-maintained change feed. Toggling `set_online(false)` makes
//! every endpoint answer 503, which the client classifies as a connection
//! failure.

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use pulperia_core::sync::primary_key_column;

pub type Row = Map<String, Value>;

#[derive(Default)]
struct State {
    tables: HashMap<String, BTreeMap<String, Row>>,
    change_log: Vec<Row>,
    next_seq: i64,
}

impl State {
    fn log_change(&mut self, table: &str, operation: &str, record_id: &str, payload: Option<&Row>) {
        self.next_seq += 1;
        self.change_log.push(
            json!({
                "seq": self.next_seq,
                "table_name": table,
                "operation": operation,
                "record_id": record_id,
                "payload": payload.map(|p| Value::Object(p.clone())).unwrap_or(Value::Null),
            })
            .as_object()
            .unwrap()
            .clone(),
        );
    }

    fn apply_upsert(&mut self, table: &str, row: Row, log: bool) {
        let pk = primary_key_column(table);
        let id = row
            .get(pk)
            .map(value_text)
            .unwrap_or_default();
        let rows = self.tables.entry(table.to_string()).or_default();
        let (operation, merged) = match rows.get(&id) {
            Some(existing) => {
                let mut merged = existing.clone();
                for (column, value) in &row {
                    merged.insert(column.clone(), value.clone());
                }
                ("update", merged)
            }
            None => ("insert", row),
        };
        rows.insert(id.clone(), merged.clone());
        if log {
            self.log_change(table, operation, &id, Some(&merged));
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(v) => v.clone(),
        other => other.to_string(),
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                out.push(byte);
                i += 3;
                continue;
            }
            out.push(bytes[i]);
            i += 1;
        } else if bytes[i] == b'+' {
            out.push(b' ');
            i += 1;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

struct Request {
    method: String,
    path: String,
    query: Vec<(String, String)>,
    prefer: Option<String>,
    body: String,
}

async fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buffer = Vec::new();
    let header_end = loop {
        let mut chunk = [0_u8; 2048];
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(offset) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break offset;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut content_length = 0;
    let mut prefer = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                "prefer" => prefer = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        let mut chunk = [0_u8; 2048];
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }

    let (path, raw_query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target, String::new()),
    };
    let query = raw_query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((percent_decode(k), percent_decode(v)))
        })
        .collect();

    Some(Request {
        method,
        path,
        query,
        prefer,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn respond(stream: &mut TcpStream, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        409 => "Conflict",
        503 => "Service Unavailable",
        _ => "Error",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;
}

fn matches_filter(row: &Row, column: &str, operand: &str) -> bool {
    let actual = row.get(column).unwrap_or(&Value::Null);
    if let Some(expected) = operand.strip_prefix("eq.") {
        return !actual.is_null() && value_text(actual) == expected;
    }
    if let Some(expected) = operand.strip_prefix("gt.") {
        return match (actual.as_i64(), expected.parse::<i64>()) {
            (Some(a), Ok(b)) => a > b,
            _ => value_text(actual).as_str() > expected,
        };
    }
    if operand == "is.null" {
        return actual.is_null();
    }
    false
}

fn run_select(rows: Vec<Row>, query: &[(String, String)]) -> Vec<Row> {
    let mut out = rows;
    let mut order: Option<(String, bool)> = None;
    let mut limit: Option<usize> = None;
    let mut columns: Option<Vec<String>> = None;

    for (key, value) in query {
        match key.as_str() {
            "order" => {
                let (column, direction) = value.split_once('.').unwrap_or((value.as_str(), "asc"));
                order = Some((column.to_string(), direction == "desc"));
            }
            "limit" => limit = value.parse().ok(),
            "select" => {
                columns = Some(value.split(',').map(str::to_string).collect());
            }
            column => {
                let operand = value.clone();
                out.retain(|row| matches_filter(row, column, &operand));
            }
        }
    }

    if let Some((column, descending)) = order {
        out.sort_by(|a, b| {
            let left = a.get(&column).unwrap_or(&Value::Null);
            let right = b.get(&column).unwrap_or(&Value::Null);
            let ordering = match (left.as_i64(), right.as_i64()) {
                (Some(l), Some(r)) => l.cmp(&r),
                _ => value_text(left).cmp(&value_text(right)),
            };
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
    if let Some(limit) = limit {
        out.truncate(limit);
    }
    if let Some(columns) = columns {
        for row in &mut out {
            row.retain(|column, _| columns.iter().any(|c| c == column));
        }
    }
    out
}

pub struct MockRemote {
    pub base_url: String,
    state: Arc<Mutex<State>>,
    online: Arc<AtomicBool>,
    reject_ids: Arc<Mutex<HashSet<String>>>,
    handle: JoinHandle<()>,
}

impl Drop for MockRemote {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MockRemote {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock listener");
        let addr = listener.local_addr().expect("listener addr");
        let state = Arc::new(Mutex::new(State::default()));
        let online = Arc::new(AtomicBool::new(true));
        let reject_ids = Arc::new(Mutex::new(HashSet::new()));

        let state_clone = Arc::clone(&state);
        let online_clone = Arc::clone(&online);
        let reject_clone = Arc::clone(&reject_ids);
        let handle = tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(value) => value,
                    Err(_) => break,
                };
                let state = Arc::clone(&state_clone);
                let online = Arc::clone(&online_clone);
                let reject_ids = Arc::clone(&reject_clone);
                tokio::spawn(async move {
                    let Some(request) = read_request(&mut stream).await else {
                        return;
                    };
                    let (status, body) = handle_request(&state, &online, &reject_ids, request);
                    respond(&mut stream, status, &body).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            online,
            reject_ids,
            handle,
        }
    }

    /// While false, every endpoint answers 503.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Writes whose primary key equals `id` fail with 400, simulating
    /// server-side validation rejecting one record.
    pub fn reject_record(&self, id: &str) {
        self.reject_ids.lock().unwrap().insert(id.to_string());
    }

    /// Seed a row without a change feed entry (pre-existing remote state).
    pub fn seed(&self, table: &str, row: Row) {
        self.state.lock().unwrap().apply_upsert(table, row, false);
    }

    /// Apply a write as if another terminal had made it: updates state and
    /// appends to the change feed.
    pub fn push_change(&self, table: &str, row: Row) {
        self.state.lock().unwrap().apply_upsert(table, row, true);
    }

    pub fn push_delete(&self, table: &str, id: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .remove(id);
        state.log_change(table, "delete", id, None);
    }

    pub fn row(&self, table: &str, id: &str) -> Option<Row> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .and_then(|rows| rows.get(id))
            .cloned()
    }

    pub fn table_len(&self, table: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }
}

fn handle_request(
    state: &Arc<Mutex<State>>,
    online: &Arc<AtomicBool>,
    reject_ids: &Arc<Mutex<HashSet<String>>>,
    request: Request,
) -> (u16, String) {
    if !online.load(Ordering::SeqCst) {
        return (503, r#"{"message":"service unavailable"}"#.to_string());
    }

    if request.path == "/health" {
        return (200, "{}".to_string());
    }

    let Some(table) = request.path.strip_prefix("/rest/v1/") else {
        return (404, r#"{"message":"no such route"}"#.to_string());
    };
    let table = table.to_string();
    let mut state = state.lock().unwrap();

    match request.method.as_str() {
        "GET" => {
            let rows = if table == "change_log" {
                state.change_log.clone()
            } else {
                state
                    .tables
                    .get(&table)
                    .map(|rows| rows.values().cloned().collect())
                    .unwrap_or_default()
            };
            let selected = run_select(rows, &request.query);
            (200, serde_json::to_string(&selected).unwrap())
        }
        "POST" => {
            let Ok(Value::Object(row)) = serde_json::from_str::<Value>(&request.body) else {
                return (400, r#"{"message":"body must be a row object"}"#.to_string());
            };
            let pk = primary_key_column(&table);
            let id = row.get(pk).map(value_text).unwrap_or_default();
            if reject_ids.lock().unwrap().contains(&id) {
                return (
                    400,
                    r#"{"code":"23514","message":"rejected by validation"}"#.to_string(),
                );
            }
            let merge = request
                .prefer
                .as_deref()
                .is_some_and(|p| p.contains("merge-duplicates"));
            let exists = state
                .tables
                .get(&table)
                .is_some_and(|rows| rows.contains_key(&id));
            if exists && !merge {
                return (
                    409,
                    r#"{"code":"23505","message":"duplicate key value"}"#.to_string(),
                );
            }
            state.apply_upsert(&table, row, true);
            (201, String::new())
        }
        "PATCH" => {
            let Ok(Value::Object(patch)) = serde_json::from_str::<Value>(&request.body) else {
                return (400, r#"{"message":"body must be a row object"}"#.to_string());
            };
            let pk = primary_key_column(&table);
            let Some(id) = request
                .query
                .iter()
                .find(|(k, _)| k == pk)
                .and_then(|(_, v)| v.strip_prefix("eq."))
                .map(str::to_string)
            else {
                return (400, r#"{"message":"missing key filter"}"#.to_string());
            };
            if reject_ids.lock().unwrap().contains(&id) {
                return (
                    400,
                    r#"{"code":"23514","message":"rejected by validation"}"#.to_string(),
                );
            }
            let exists = state
                .tables
                .get(&table)
                .is_some_and(|rows| rows.contains_key(&id));
            if !exists {
                return (200, "[]".to_string());
            }
            let mut merged = state.tables.get(&table).unwrap().get(&id).unwrap().clone();
            for (column, value) in &patch {
                merged.insert(column.clone(), value.clone());
            }
            state.apply_upsert(&table, merged.clone(), true);
            (200, serde_json::to_string(&vec![merged]).unwrap())
        }
        "DELETE" => {
            let pk = primary_key_column(&table);
            let Some(id) = request
                .query
                .iter()
                .find(|(k, _)| k == pk)
                .and_then(|(_, v)| v.strip_prefix("eq."))
                .map(str::to_string)
            else {
                return (400, r#"{"message":"missing key filter"}"#.to_string());
            };
            let removed = state
                .tables
                .entry(table.clone())
                .or_default()
                .remove(&id);
            match removed {
                Some(row) => {
                    state.log_change(&table, "delete", &id, None);
                    (200, serde_json::to_string(&vec![row]).unwrap())
                }
                None => (200, "[]".to_string()),
            }
        }
        _ => (404, r#"{"message":"unsupported method"}"#.to_string()),
    }
}

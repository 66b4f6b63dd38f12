use serde_json::Value;

/// A record as stored by the backend and held in live collections.
pub type Record = serde_json::Map<String, Value>;

/// Backend record identifiers. Numeric ids are carried as text.
pub type RecordId = String;

/// Render a scalar JSON value as text for comparisons.
///
/// Returns `None` for null, arrays and objects.
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Look up a dotted attribute path (e.g. `"aws.region"`) in a record.
pub fn get_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = record.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Text form of the value at `path`, if it is a scalar.
pub fn text_at(record: &Record, path: &str) -> Option<String> {
    get_path(record, path).and_then(value_as_text)
}

/// Write `value` at a dotted attribute path, creating intermediate objects.
///
/// A non-object value sitting on an intermediate segment is replaced.
pub fn set_path(record: &mut Record, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            record.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = record
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Record::new()));
            if !slot.is_object() {
                *slot = Value::Object(Record::new());
            }
            if let Value::Object(child) = slot {
                set_path(child, rest, value);
            }
        }
    }
}

/// `true` when a value is absent, null, an empty string or an empty collection.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(Value::Number(_)) | Some(Value::Bool(_)) => false,
    }
}

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as Json;
use starlark::values::{Heap, Value, dict::AllocDict, list::AllocList};

pub(super) fn to_json(value: Value<'_>) -> anyhow::Result<Json> {
	value.to_json_value().map_err(|err| anyhow::anyhow!("Value is not JSON-compatible: {err}"))
}

/// `None` for a missing argument and for an explicit Starlark `None`.
pub(super) fn optional_json(value: Option<Value<'_>>) -> anyhow::Result<Option<Json>> {
	match value {
		Some(value) if !value.is_none() => Ok(Some(to_json(value)?)),
		_ => Ok(None),
	}
}

pub(super) fn from_starlark<T>(value: Value<'_>, what: &str) -> anyhow::Result<T>
where
	T: DeserializeOwned,
{
	serde_json::from_value(to_json(value)?)
		.map_err(|err| anyhow::anyhow!("{what} has an unexpected shape: {err}"))
}

pub(super) fn positive_int(value: &Json, what: &str) -> anyhow::Result<u64> {
	match value.as_u64() {
		Some(n) if n > 0 => Ok(n),
		_ => anyhow::bail!("{what} must be a positive integer, got {value}."),
	}
}

pub(super) fn int(value: &Json, what: &str) -> anyhow::Result<i64> {
	value.as_i64().ok_or_else(|| anyhow::anyhow!("{what} must be an integer, got {value}."))
}

pub(super) fn float(value: &Json, what: &str) -> anyhow::Result<f64> {
	value.as_f64().ok_or_else(|| anyhow::anyhow!("{what} must be a number, got {value}."))
}

pub(super) fn alloc<'v, T>(heap: &'v Heap, value: &T) -> anyhow::Result<Value<'v>>
where
	T: Serialize + ?Sized,
{
	Ok(to_starlark(heap, &serde_json::to_value(value)?))
}

pub(super) fn to_starlark<'v>(heap: &'v Heap, value: &Json) -> Value<'v> {
	match value {
		Json::Null => Value::new_none(),
		Json::Bool(flag) => Value::new_bool(*flag),
		Json::Number(number) => match number.as_i64() {
			Some(int) => heap.alloc(int),
			None => heap.alloc(number.as_f64().unwrap_or(f64::NAN)),
		},
		Json::String(text) => heap.alloc(text.as_str()),
		Json::Array(items) =>
			heap.alloc(AllocList(items.iter().map(|item| to_starlark(heap, item)))),
		Json::Object(map) => heap.alloc(AllocDict(
			map.iter().map(|(key, value)| (key.as_str(), to_starlark(heap, value))),
		)),
	}
}

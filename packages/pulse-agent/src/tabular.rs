//! Row and column helpers over JSON rows. A row is either a payload object or a hit carrying
//! one under `payload`; keys are looked up on the row first and then on its payload.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::{Error, Result};

pub fn field<'a>(row: &'a Value, key: &str) -> Option<&'a Value> {
	row.get(key).or_else(|| row.get("payload").and_then(|payload| payload.get(key)))
}

/// Numeric view of `values`. Nulls are skipped; anything else non-numeric is an error.
pub fn numbers(values: &[Value]) -> Result<Vec<f64>> {
	let mut out = Vec::with_capacity(values.len());

	for value in values {
		match value {
			Value::Null => continue,
			Value::Number(number) => out.push(number.as_f64().unwrap_or(f64::NAN)),
			other => {
				return Err(Error::InvalidRequest {
					message: format!("Expected a number, got {other}."),
				});
			},
		}
	}

	Ok(out)
}

pub fn mean(values: &[Value]) -> Result<Option<f64>> {
	let numbers = numbers(values)?;

	if numbers.is_empty() {
		return Ok(None);
	}

	Ok(Some(numbers.iter().sum::<f64>() / numbers.len() as f64))
}

/// Sum of `values`; stays an integer when every input is one.
pub fn total(values: &[Value]) -> Result<Value> {
	let ints: Option<Vec<i64>> =
		values.iter().filter(|value| !value.is_null()).map(Value::as_i64).collect();

	if let Some(ints) = ints
		&& let Some(sum) = ints.iter().try_fold(0_i64, |acc, n| acc.checked_add(*n))
	{
		return Ok(Value::from(sum));
	}

	Ok(Value::from(numbers(values)?.iter().sum::<f64>()))
}

pub fn round_to(value: f64, digits: i32) -> f64 {
	let factor = 10_f64.powi(digits);

	(value * factor).round() / factor
}

/// `[{key: group, "count": n}]`, most frequent first; ties keep first-seen order.
pub fn count_by(rows: &[Value], key: &str) -> Vec<Value> {
	let groups = group(rows, key);
	let mut counted: Vec<(Value, usize)> =
		groups.into_iter().map(|(group, members)| (group, members.len())).collect();

	counted.sort_by(|a, b| b.1.cmp(&a.1));

	counted
		.into_iter()
		.map(|(group, count)| {
			let mut row = Map::new();

			row.insert(key.to_string(), group);
			row.insert("count".to_string(), Value::from(count));

			Value::Object(row)
		})
		.collect()
}

/// `[{key: group, "mean": m, "count": n}]` in first-seen group order.
pub fn group_mean(rows: &[Value], key: &str, value_key: &str) -> Result<Vec<Value>> {
	let mut out = Vec::new();

	for (group, members) in group(rows, key) {
		let values: Vec<Value> = members
			.iter()
			.map(|row| field(row, value_key).cloned().unwrap_or(Value::Null))
			.collect();
		let numbers = numbers(&values)?;
		let mean = if numbers.is_empty() {
			Value::Null
		} else {
			Value::from(numbers.iter().sum::<f64>() / numbers.len() as f64)
		};
		let mut row = Map::new();

		row.insert(key.to_string(), group);
		row.insert("mean".to_string(), mean);
		row.insert("count".to_string(), Value::from(numbers.len()));

		out.push(Value::Object(row));
	}

	Ok(out)
}

/// Flat rows holding only `keys`; missing keys become null.
pub fn select_columns(rows: &[Value], keys: &[String]) -> Vec<Value> {
	rows.iter()
		.map(|row| {
			let selected: Map<String, Value> = keys
				.iter()
				.map(|key| (key.clone(), field(row, key).cloned().unwrap_or(Value::Null)))
				.collect();

			Value::Object(selected)
		})
		.collect()
}

pub fn where_eq(rows: Vec<Value>, key: &str, expected: &Value) -> Vec<Value> {
	rows.into_iter()
		.filter(|row| field(row, key).is_some_and(|value| values_equal(value, expected)))
		.collect()
}

/// The `n` rows with the highest numeric `key`. Rows without a number under `key` rank last.
pub fn top_n(rows: Vec<Value>, key: &str, n: usize) -> Vec<Value> {
	let mut ranked: Vec<(Option<f64>, Value)> = rows
		.into_iter()
		.map(|row| (field(&row, key).and_then(Value::as_f64), row))
		.collect();

	ranked.sort_by(|a, b| match (a.0, b.0) {
		(Some(x), Some(y)) => y.total_cmp(&x),
		(Some(_), None) => std::cmp::Ordering::Less,
		(None, Some(_)) => std::cmp::Ordering::Greater,
		(None, None) => std::cmp::Ordering::Equal,
	});

	ranked.into_iter().take(n).map(|(_, row)| row).collect()
}

/// JSON equality where `4` and `4.0` compare equal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
			(Some(x), Some(y)) => x == y,
			_ => x == y,
		},
		_ => a == b,
	}
}

fn group<'a>(rows: &'a [Value], key: &str) -> Vec<(Value, Vec<&'a Value>)> {
	let mut order: Vec<(Value, Vec<&'a Value>)> = Vec::new();
	let mut index: HashMap<String, usize> = HashMap::new();

	for row in rows {
		let group = field(row, key).cloned().unwrap_or(Value::Null);
		let slot = *index.entry(group.to_string()).or_insert_with(|| {
			order.push((group.clone(), Vec::new()));

			order.len() - 1
		});

		order[slot].1.push(row);
	}

	order
}

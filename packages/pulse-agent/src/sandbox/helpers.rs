use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value as Json;
use starlark::{environment::GlobalsBuilder, eval::Evaluator, starlark_module, values::Value};

use super::convert::{alloc, float, from_starlark, int, positive_int, to_json};
use crate::{chart, tabular};

fn rows(value: Value<'_>, what: &str) -> anyhow::Result<Vec<Json>> {
	from_starlark(value, what)
}

#[starlark_module]
pub(super) fn register(builder: &mut GlobalsBuilder) {
	fn mean<'v>(values: Value<'v>, eval: &mut Evaluator<'v, '_, '_>) -> anyhow::Result<Value<'v>> {
		let values: Vec<Json> = from_starlark(values, "mean() values")?;

		alloc(eval.heap(), &tabular::mean(&values)?)
	}

	fn total<'v>(values: Value<'v>, eval: &mut Evaluator<'v, '_, '_>) -> anyhow::Result<Value<'v>> {
		let values: Vec<Json> = from_starlark(values, "total() values")?;

		alloc(eval.heap(), &tabular::total(&values)?)
	}

	fn round_to<'v>(
		value: Value<'v>,
		digits: Option<Value<'v>>,
		eval: &mut Evaluator<'v, '_, '_>,
	) -> anyhow::Result<Value<'v>> {
		let value = float(&to_json(value)?, "round_to() value")?;
		let digits = match digits {
			Some(digits) if !digits.is_none() => int(&to_json(digits)?, "round_to() digits")?,
			_ => 0,
		};
		let digits = i32::try_from(digits)
			.map_err(|_| anyhow::anyhow!("round_to() digits is out of range: {digits}."))?;

		alloc(eval.heap(), &tabular::round_to(value, digits))
	}

	fn count_by<'v>(
		items: Value<'v>,
		key: &'v str,
		eval: &mut Evaluator<'v, '_, '_>,
	) -> anyhow::Result<Value<'v>> {
		let items = rows(items, "count_by() items")?;

		alloc(eval.heap(), &tabular::count_by(&items, key))
	}

	fn group_mean<'v>(
		items: Value<'v>,
		key: &'v str,
		value_key: &'v str,
		eval: &mut Evaluator<'v, '_, '_>,
	) -> anyhow::Result<Value<'v>> {
		let items = rows(items, "group_mean() items")?;

		alloc(eval.heap(), &tabular::group_mean(&items, key, value_key)?)
	}

	fn select_columns<'v>(
		items: Value<'v>,
		keys: Value<'v>,
		eval: &mut Evaluator<'v, '_, '_>,
	) -> anyhow::Result<Value<'v>> {
		let items = rows(items, "select_columns() items")?;
		let keys: Vec<String> = from_starlark(keys, "select_columns() keys")?;

		alloc(eval.heap(), &tabular::select_columns(&items, &keys))
	}

	fn where_eq<'v>(
		items: Value<'v>,
		key: &'v str,
		expected: Value<'v>,
		eval: &mut Evaluator<'v, '_, '_>,
	) -> anyhow::Result<Value<'v>> {
		let items = rows(items, "where_eq() items")?;
		let expected = to_json(expected)?;

		alloc(eval.heap(), &tabular::where_eq(items, key, &expected))
	}

	fn top_n<'v>(
		items: Value<'v>,
		key: &'v str,
		n: Value<'v>,
		eval: &mut Evaluator<'v, '_, '_>,
	) -> anyhow::Result<Value<'v>> {
		let items = rows(items, "top_n() items")?;
		let n = positive_int(&to_json(n)?, "top_n() n")?;

		alloc(eval.heap(), &tabular::top_n(items, key, usize::try_from(n).unwrap_or(usize::MAX)))
	}

	fn bar_chart<'v>(labels: Value<'v>, values: Value<'v>) -> anyhow::Result<String> {
		let labels: Vec<Json> = from_starlark(labels, "bar_chart() labels")?;
		let labels: Vec<String> = labels
			.into_iter()
			.map(|label| match label {
				Json::String(text) => text,
				other => other.to_string(),
			})
			.collect();
		let values: Vec<f64> = from_starlark(values, "bar_chart() values")?;

		Ok(chart::bar_chart(&labels, &values)?)
	}

	fn line_chart<'v>(values: Value<'v>) -> anyhow::Result<String> {
		let values: Vec<f64> = from_starlark(values, "line_chart() values")?;

		Ok(chart::line_chart(&values)?)
	}

	fn b64encode(text: &str) -> anyhow::Result<String> {
		Ok(STANDARD.encode(text.as_bytes()))
	}

	fn b64decode(encoded: &str) -> anyhow::Result<String> {
		let bytes = STANDARD
			.decode(encoded.trim())
			.map_err(|err| anyhow::anyhow!("b64decode() input is not valid base64: {err}."))?;

		String::from_utf8(bytes)
			.map_err(|err| anyhow::anyhow!("b64decode() output is not UTF-8: {err}."))
	}
}

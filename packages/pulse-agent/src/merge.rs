use std::{
	collections::{HashMap, HashSet},
	str::FromStr,
};

use pulse_storage::RecordId;

use crate::Error;

/// How per-concept result sets are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
	/// Alternatives: records found by any concept.
	Union,
	/// Combined constraints: records found by every concept.
	Intersection,
}
impl FromStr for MergeMode {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"or" | "union" => Ok(Self::Union),
			"and" | "intersection" => Ok(Self::Intersection),
			other => Err(Error::InvalidRequest {
				message: format!("Unknown merge mode {other:?}; expected \"or\" or \"and\"."),
			}),
		}
	}
}

/// Combines result sets keyed strictly by record id.
///
/// The first occurrence of an id wins and output follows first-seen order: across all sets
/// for [`MergeMode::Union`], within the first set for [`MergeMode::Intersection`].
pub fn merge_by_id<T, K>(sets: Vec<Vec<T>>, mode: MergeMode, key: K) -> Vec<T>
where
	K: Fn(&T) -> RecordId,
{
	match mode {
		MergeMode::Union => {
			let mut seen = HashSet::new();
			let mut out = Vec::new();

			for item in sets.into_iter().flatten() {
				if seen.insert(key(&item)) {
					out.push(item);
				}
			}

			out
		},
		MergeMode::Intersection => {
			let mut sets = sets.into_iter();
			let Some(first) = sets.next() else {
				return Vec::new();
			};
			let set_count = sets.len() + 1;
			let mut hits: HashMap<RecordId, usize> = HashMap::new();

			for set in sets {
				let ids: HashSet<RecordId> = set.iter().map(&key).collect();

				for id in ids {
					*hits.entry(id).or_default() += 1;
				}
			}

			let mut seen = HashSet::new();

			first
				.into_iter()
				.filter(|item| {
					let id = key(item);
					let everywhere = set_count == 1 || hits.get(&id) == Some(&(set_count - 1));

					everywhere && seen.insert(id)
				})
				.collect()
		},
	}
}

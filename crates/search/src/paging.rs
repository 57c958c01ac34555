//! Page windows and the overfetch policy shared by both retrieval paths.

/// Upper bound on a page size.
pub const MAX_LIMIT: usize = 100;

/// How many raw chunk candidates to request for a page.
///
/// Several chunks of one posting can occupy the top of the ranking, so the
/// index is asked for `(offset + limit) * dup_factor` candidates, never fewer
/// than `floor` or `limit` and never more than `ceil`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverfetchPolicy {
	pub dup_factor: f64,
	pub floor: usize,
	pub ceil: usize,
}

impl Default for OverfetchPolicy {
	fn default() -> Self {
		Self { dup_factor: 5.0, floor: 100, ceil: 2000 }
	}
}

impl OverfetchPolicy {
	pub fn candidates(&self, offset: usize, limit: usize) -> usize {
		let need = (offset.saturating_add(limit) as f64 * self.dup_factor).floor() as usize;
		need.max(self.floor).min(self.ceil).max(limit)
	}
}

/// A requested slice of a ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
	pub offset: usize,
	pub limit: usize,
}

impl PageWindow {
	/// Offset floored at 0, limit clamped to `1..=MAX_LIMIT`.
	pub fn clamped(offset: i64, limit: i64) -> Self {
		Self {
			offset: offset.max(0) as usize,
			limit: limit.clamp(1, MAX_LIMIT as i64) as usize,
		}
	}

	/// The `[offset, offset + limit)` slice of `items`; empty past the end.
	pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
		if self.offset >= items.len() {
			return &[];
		}
		let end = self.offset.saturating_add(self.limit).min(items.len());
		&items[self.offset..end]
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_overfetch_examples() {
		let policy = OverfetchPolicy::default();
		assert_eq!(policy.candidates(0, 20), 100);
		assert_eq!(policy.candidates(40, 20), 300);
		assert_eq!(policy.candidates(1000, 100), 2000);
	}

	#[test]
	fn test_overfetch_bounds() {
		let policy = OverfetchPolicy::default();
		for offset in [0usize, 1, 19, 50, 399, 5000, usize::MAX] {
			for limit in [1usize, 10, 20, 100] {
				let n = policy.candidates(offset, limit);
				assert!(n >= limit.max(policy.floor), "n={} offset={} limit={}", n, offset, limit);
				assert!(n <= policy.ceil);
			}
		}
	}

	#[test]
	fn test_overfetch_never_below_limit() {
		let policy = OverfetchPolicy { dup_factor: 1.0, floor: 10, ceil: 50 };
		assert_eq!(policy.candidates(0, 80), 80);
	}

	#[test]
	fn test_fractional_dup_factor_floors() {
		let policy = OverfetchPolicy { dup_factor: 2.5, floor: 0, ceil: 2000 };
		assert_eq!(policy.candidates(0, 3), 7);
	}

	#[test]
	fn test_window_clamping() {
		assert_eq!(PageWindow::clamped(-5, 0), PageWindow { offset: 0, limit: 1 });
		assert_eq!(PageWindow::clamped(10, 500), PageWindow { offset: 10, limit: 100 });
	}

	#[test]
	fn test_window_slice() {
		let items = [1, 2, 3, 4, 5];
		assert_eq!(PageWindow { offset: 0, limit: 2 }.slice(&items), &[1, 2]);
		assert_eq!(PageWindow { offset: 4, limit: 2 }.slice(&items), &[5]);
		assert!(PageWindow { offset: 5, limit: 2 }.slice(&items).is_empty());
		assert!(PageWindow { offset: usize::MAX, limit: 2 }.slice(&items).is_empty());
	}
}

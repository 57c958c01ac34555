//! Salary bucket labels.
//!
//! Salaries are discretised into fixed-width brackets labelled in 만 (10,000
//! KRW) units, e.g. `"3,600만~3,800만"`. Bucket floors are aligned to the
//! bucket grid by integer division.

use std::sync::LazyLock;

use regex::Regex;

/// Won per 만.
const MAN: u64 = 10_000;

/// An amount in 만원 with an optional "at least"/"at most" qualifier.
static SALARY_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"([0-9]{3,4})\s*만?\s*원?\s*(이상|이하|초과|미만)?").expect("salary regex is valid")
});

/// How a free-text amount bounds the salary range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
	/// 이상 / 초과
	AtLeast,
	/// 이하 / 미만
	AtMost,
	/// No qualifier.
	Exact,
}

impl Qualifier {
	fn parse(word: Option<&str>) -> Self {
		match word {
			Some("이상") | Some("초과") => Qualifier::AtLeast,
			Some("이하") | Some("미만") => Qualifier::AtMost,
			_ => Qualifier::Exact,
		}
	}
}

/// Bucket grid and the qualifier-to-range mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryPolicy {
	/// Bracket width in won.
	pub bucket_width: u64,
	/// Highest bucket floor produced for open-ended "at least" ranges.
	pub cap: u64,
	/// Buckets emitted for an amount without a qualifier, starting at its own.
	pub exact_buckets: u64,
}

impl Default for SalaryPolicy {
	fn default() -> Self {
		Self { bucket_width: 2_000_000, cap: 200_000_000, exact_buckets: 1 }
	}
}

impl SalaryPolicy {
	/// Floor of the bucket containing `amount`.
	pub fn floor(&self, amount: u64) -> u64 {
		(amount / self.bucket_width) * self.bucket_width
	}

	pub fn label(&self, floor: u64) -> String {
		format!(
			"{}만~{}만",
			group_thousands(to_man(floor)),
			group_thousands(to_man(floor + self.bucket_width))
		)
	}

	/// Labels for every bucket from `min`'s up to `max`'s, both inclusive.
	/// A missing `min` starts at zero; a missing `max` runs to the cap.
	pub fn labels_between(&self, min: Option<u64>, max: Option<u64>) -> Vec<String> {
		if min.is_none() && max.is_none() {
			return vec![];
		}
		let mut start = self.floor(min.unwrap_or(0));
		let mut stop = match max {
			Some(m) => self.floor(m),
			None => self.cap,
		};
		if stop < start {
			std::mem::swap(&mut start, &mut stop);
		}
		let mut labels = Vec::new();
		let mut floor = start;
		while floor <= stop {
			labels.push(self.label(floor));
			floor += self.bucket_width;
		}
		labels
	}

	/// Labels for an amount and qualifier, amount in won.
	pub fn labels_for(&self, amount: u64, qualifier: Qualifier) -> Vec<String> {
		let floor = self.floor(amount);
		match qualifier {
			Qualifier::AtLeast => self.labels_between(Some(floor), None),
			Qualifier::AtMost => self.labels_between(None, Some(floor)),
			Qualifier::Exact => (0..self.exact_buckets.max(1))
				.map(|i| self.label(floor + i * self.bucket_width))
				.collect(),
		}
	}

	/// Parse the first "NNNN만원 [qualifier]" mention in free text.
	pub fn labels_from_text(&self, text: &str) -> Vec<String> {
		let Some(caps) = SALARY_RE.captures(text) else {
			return vec![];
		};
		let Some(amount_man) = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) else {
			return vec![];
		};
		let qualifier = Qualifier::parse(caps.get(2).map(|m| m.as_str()));
		self.labels_for(amount_man * MAN, qualifier)
	}
}

fn to_man(won: u64) -> u64 {
	(won + MAN / 2) / MAN
}

fn group_thousands(n: u64) -> String {
	let digits = n.to_string();
	let mut out = String::with_capacity(digits.len() + digits.len() / 3);
	for (i, ch) in digits.chars().enumerate() {
		if i > 0 && (digits.len() - i) % 3 == 0 {
			out.push(',');
		}
		out.push(ch);
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_label_format() {
		let policy = SalaryPolicy::default();
		assert_eq!(policy.label(36_000_000), "3,600만~3,800만");
		assert_eq!(policy.label(0), "0만~200만");
		assert_eq!(policy.label(200_000_000), "20,000만~20,200만");
	}

	#[test]
	fn test_floor_aligns_to_grid() {
		let policy = SalaryPolicy::default();
		assert_eq!(policy.floor(37_000_000), 36_000_000);
		assert_eq!(policy.floor(38_000_000), 38_000_000);
		assert_eq!(policy.floor(1_999_999), 0);
	}

	#[test]
	fn test_at_least_runs_to_cap() {
		let labels = SalaryPolicy::default().labels_from_text("3600만원 이상 버는 백엔드");
		assert_eq!(labels.first().map(String::as_str), Some("3,600만~3,800만"));
		assert_eq!(labels.get(1).map(String::as_str), Some("3,800만~4,000만"));
		assert_eq!(labels.last().map(String::as_str), Some("20,000만~20,200만"));
		// 36M..=200M in 2M steps
		assert_eq!(labels.len(), 83);
	}

	#[test]
	fn test_at_most_starts_at_zero() {
		let labels = SalaryPolicy::default().labels_from_text("4000만원 이하 CS");
		assert_eq!(labels.first().map(String::as_str), Some("0만~200만"));
		assert_eq!(labels.last().map(String::as_str), Some("4,000만~4,200만"));
		assert_eq!(labels.len(), 21);
	}

	#[test]
	fn test_exceed_and_below_synonyms() {
		let policy = SalaryPolicy::default();
		assert_eq!(policy.labels_from_text("5000만 초과"), policy.labels_from_text("5000만원 이상"));
		assert_eq!(policy.labels_from_text("5000 미만"), policy.labels_from_text("5000만원 이하"));
	}

	#[test]
	fn test_bare_amount_is_single_bucket() {
		let policy = SalaryPolicy::default();
		assert_eq!(policy.labels_from_text("서울 5200만원 프론트"), vec!["5,200만~5,400만"]);
		// 5300만 sits in the 5200 bucket
		assert_eq!(policy.labels_from_text("5300만원"), vec!["5,200만~5,400만"]);
	}

	#[test]
	fn test_exact_span_is_configurable() {
		let policy = SalaryPolicy { exact_buckets: 3, ..Default::default() };
		assert_eq!(
			policy.labels_from_text("5200만원"),
			vec!["5,200만~5,400만", "5,400만~5,600만", "5,600만~5,800만"]
		);
	}

	#[test]
	fn test_no_amount_yields_nothing() {
		let policy = SalaryPolicy::default();
		assert!(policy.labels_from_text("강남구 백엔드").is_empty());
		assert!(policy.labels_from_text("연봉 50만").is_empty());
	}

	#[test]
	fn test_reversed_range_is_swapped() {
		let policy = SalaryPolicy::default();
		assert_eq!(
			policy.labels_between(Some(40_000_000), Some(36_000_000)),
			policy.labels_between(Some(36_000_000), Some(40_000_000))
		);
		assert!(policy.labels_between(None, None).is_empty());
	}
}

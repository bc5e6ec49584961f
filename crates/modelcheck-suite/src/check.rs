use std::fmt;

/// One named boolean assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub group: String,
    pub name: String,
    pub passed: bool,
    pub detail: Option<String>,
}

/// Named checks grouped by scenario. The run passes only when every check
/// passed (`rate == 1.0`).
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    results: Vec<CheckResult>,
}

impl CheckReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&mut self, name: impl Into<String>) -> Group<'_> {
        Group {
            report: self,
            name: name.into(),
        }
    }

    fn record(&mut self, result: CheckResult) -> bool {
        let passed = result.passed;
        if passed {
            tracing::info!(group = %result.group, check = %result.name, "✓");
        } else {
            tracing::warn!(
                group = %result.group,
                check = %result.name,
                detail = result.detail.as_deref().unwrap_or(""),
                "✗"
            );
        }
        self.results.push(result);
        passed
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    /// Fraction of passing checks; an empty report counts as passing.
    pub fn rate(&self) -> f64 {
        if self.results.is_empty() {
            1.0
        } else {
            self.passed() as f64 / self.total() as f64
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "checks: {:.2}% ✓ {} ✗ {}",
            self.rate() * 100.0,
            self.passed(),
            self.failed()
        )
    }
}

/// Checks recorded under one group name.
pub struct Group<'a> {
    report: &'a mut CheckReport,
    name: String,
}

impl Group<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&mut self, name: impl Into<String>, passed: bool) -> bool {
        self.report.record(CheckResult {
            group: self.name.clone(),
            name: name.into(),
            passed,
            detail: None,
        })
    }

    /// Record whether `result` is `Ok`, keeping the error text on failure.
    pub fn check_ok<T, E: fmt::Display>(
        &mut self,
        name: impl Into<String>,
        result: &Result<T, E>,
    ) -> bool {
        self.report.record(CheckResult {
            group: self.name.clone(),
            name: name.into(),
            passed: result.is_ok(),
            detail: result.as_ref().err().map(|e| e.to_string()),
        })
    }

    pub fn fail(&mut self, name: impl Into<String>, detail: impl fmt::Display) -> bool {
        self.report.record(CheckResult {
            group: self.name.clone(),
            name: name.into(),
            passed: false,
            detail: Some(detail.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_and_threshold() {
        let mut report = CheckReport::new();
        assert!(report.all_passed());
        assert_eq!(report.rate(), 1.0);

        let mut g = report.group("health");
        assert!(g.check("status is 200", true));
        assert!(!g.check_ok("decode", &Err::<(), _>("bad json")));

        assert_eq!(report.total(), 2);
        assert_eq!(report.passed(), 1);
        assert_eq!(report.rate(), 0.5);
        assert!(!report.all_passed());

        let failure = report.failures().next().unwrap();
        assert_eq!(failure.group, "health");
        assert_eq!(failure.detail.as_deref(), Some("bad json"));
        assert_eq!(report.to_string(), "checks: 50.00% ✓ 1 ✗ 1");
    }
}

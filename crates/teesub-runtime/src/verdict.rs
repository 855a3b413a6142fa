use teesub_core::{Finding, Verdict};

/// Finding count at which a dataset is blocked outright.
pub const BLOCK_THRESHOLD: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub verdict: Verdict,
    pub score: u8,
}

/// Verdict for a finding set.
///
/// Only the number of findings counts. Finding types are not weighted and
/// there is no partial credit: the policy is a fixed three-step table.
pub fn assess(findings: &[Finding]) -> Assessment {
    assess_count(findings.len())
}

pub fn assess_count(count: usize) -> Assessment {
    let (verdict, score) = match count {
        0 => (Verdict::Allow, 100),
        n if n < BLOCK_THRESHOLD => (Verdict::Warn, 70),
        _ => (Verdict::Block, 20),
    };
    Assessment { verdict, score }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_table() {
        let table = [
            (0, Verdict::Allow, 100),
            (1, Verdict::Warn, 70),
            (2, Verdict::Warn, 70),
            (3, Verdict::Block, 20),
            (10, Verdict::Block, 20),
        ];
        for (count, verdict, score) in table {
            assert_eq!(assess_count(count), Assessment { verdict, score }, "count {count}");
        }
    }
}

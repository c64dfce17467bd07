//! Run-scoped budget accounting

use serde::{Deserialize, Serialize};

/// Approval would push allocation past the budget total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetShortfall {
    pub requested: u64,
    pub remaining: u64,
}

impl std::fmt::Display for BudgetShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requested {} exceeds remaining {}",
            format_dollars(self.requested),
            format_dollars(self.remaining)
        )
    }
}

impl std::error::Error for BudgetShortfall {}

/// Budget for one pipeline run, in whole dollars.
///
/// `allocated` only grows; `remaining` never goes negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    total: u64,
    allocated: u64,
}

impl Budget {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            allocated: 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.allocated)
    }

    pub fn can_afford(&self, cost: u64) -> bool {
        cost <= self.remaining()
    }

    /// Commit `cost` against the budget, returning the new remaining amount
    pub fn allocate(&mut self, cost: u64) -> Result<u64, BudgetShortfall> {
        if !self.can_afford(cost) {
            return Err(BudgetShortfall {
                requested: cost,
                remaining: self.remaining(),
            });
        }
        self.allocated += cost;
        Ok(self.remaining())
    }
}

/// Format whole dollars with thousands separators, e.g. `$15,000,000`
pub fn format_dollars(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push('$');
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

//! Context snapshots — the dynamic facts injected into the system prompt.
//!
//! A snapshot is computed at send time from an external source (the user's
//! ledger, or the session's learner profile) and never retained. Builders
//! return `None` when there is nothing to inject; the send proceeds without
//! a context block in that case.

pub mod financial;
pub mod learner;

use async_trait::async_trait;

use crate::session::ChatSession;

pub use financial::{FinancialContextBuilder, FinancialSnapshot};
pub use learner::{LearnerContextBuilder, LearnerSnapshot};

/// Read-only context for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextSnapshot {
    Financial(FinancialSnapshot),
    Learner(LearnerSnapshot),
}

impl ContextSnapshot {
    /// Plain-text block appended to the system prompt.
    pub fn render(&self) -> String {
        match self {
            ContextSnapshot::Financial(f) => f.render(),
            ContextSnapshot::Learner(l) => l.render(),
        }
    }

    pub fn as_financial(&self) -> Option<&FinancialSnapshot> {
        match self {
            ContextSnapshot::Financial(f) => Some(f),
            ContextSnapshot::Learner(_) => None,
        }
    }
}

/// Produces a snapshot for the session about to send.
#[async_trait]
pub trait ContextBuilder: Send + Sync {
    /// `None` means "proceed without context".
    async fn snapshot(&self, session: &ChatSession) -> Option<ContextSnapshot>;
}

// ── KPI helpers ───────────────────────────────────────────────────────────

/// `(revenue − expenses) / revenue × 100`, or 0 when revenue is not positive.
pub fn gross_margin(revenue: f64, expenses: f64) -> f64 {
    if revenue > 0.0 {
        (revenue - expenses) / revenue * 100.0
    } else {
        0.0
    }
}

/// `(current − previous) / previous × 100`, or 0 when previous is not positive.
pub fn growth(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

/// Two decimals with comma thousands separators: `1234.5` → `1,234.50`.
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gross_margin_zero_revenue_is_zero() {
        assert_eq!(gross_margin(0.0, 500.0), 0.0);
        assert!((gross_margin(1000.0, 600.0) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn growth_zero_previous_is_zero() {
        assert_eq!(growth(1200.0, 0.0), 0.0);
        assert!((growth(1200.0, 1000.0) - 20.0).abs() < 1e-9);
        assert!((growth(800.0, 1000.0) + 20.0).abs() < 1e-9);
    }

    #[test]
    fn formats_amounts_with_grouping() {
        assert_eq!(format_amount(1234.56), "1,234.56");
        assert_eq!(format_amount(1234567.0), "1,234,567.00");
        assert_eq!(format_amount(999.999), "1,000.00");
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(-42.5), "-42.50");
        assert_eq!(format_amount(-0.001), "0.00");
    }
}

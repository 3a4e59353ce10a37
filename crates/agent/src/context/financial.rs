//! Financial KPIs computed from the user's ledger.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use neutro_core::ledger::{CostType, LedgerSource, Transaction, TransactionKind};
use tracing::{debug, warn};

use super::{ContextBuilder, ContextSnapshot, format_amount, gross_margin, growth};
use crate::session::ChatSession;

/// How many expense categories are listed.
const TOP_CATEGORIES: usize = 3;

const UNCATEGORIZED: &str = "Sin categoría";

/// KPIs for the current and previous calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct FinancialSnapshot {
    pub display_name: Option<String>,
    pub total_balance: f64,
    pub savings_balance: f64,
    pub month_revenue: f64,
    pub month_expenses: f64,
    pub month_fixed_costs: f64,
    pub month_variable_costs: f64,
    pub previous_month_revenue: f64,
    pub previous_month_expenses: f64,
    pub gross_margin: f64,
    pub revenue_growth: f64,
    /// Largest expense categories this month, descending
    pub top_expense_categories: Vec<(String, f64)>,
}

impl FinancialSnapshot {
    /// Compute the snapshot for the month containing `as_of`.
    pub fn compute(
        transactions: &[Transaction],
        savings_balance: f64,
        display_name: Option<String>,
        as_of: NaiveDate,
    ) -> Self {
        let current = (as_of.year(), as_of.month());
        let previous = if as_of.month() == 1 {
            (as_of.year() - 1, 12)
        } else {
            (as_of.year(), as_of.month() - 1)
        };
        let in_month = |t: &Transaction, (y, m): (i32, u32)| t.date.year() == y && t.date.month() == m;

        let mut snapshot = Self {
            display_name,
            total_balance: transactions.iter().map(|t| t.amount).sum(),
            savings_balance,
            month_revenue: 0.0,
            month_expenses: 0.0,
            month_fixed_costs: 0.0,
            month_variable_costs: 0.0,
            previous_month_revenue: 0.0,
            previous_month_expenses: 0.0,
            gross_margin: 0.0,
            revenue_growth: 0.0,
            top_expense_categories: Vec::new(),
        };

        let mut by_category: HashMap<&str, f64> = HashMap::new();

        for t in transactions {
            match t.kind {
                TransactionKind::Income if in_month(t, current) => snapshot.month_revenue += t.amount,
                TransactionKind::Income if in_month(t, previous) => {
                    snapshot.previous_month_revenue += t.amount
                }
                TransactionKind::Expense if in_month(t, current) => {
                    let amount = t.amount.abs();
                    snapshot.month_expenses += amount;
                    match t.cost_type {
                        CostType::Fixed => snapshot.month_fixed_costs += amount,
                        CostType::Variable => snapshot.month_variable_costs += amount,
                        CostType::None => {}
                    }
                    let category = t.category.as_deref().unwrap_or(UNCATEGORIZED);
                    *by_category.entry(category).or_insert(0.0) += amount;
                }
                TransactionKind::Expense if in_month(t, previous) => {
                    snapshot.previous_month_expenses += t.amount.abs()
                }
                _ => {}
            }
        }

        snapshot.gross_margin = gross_margin(snapshot.month_revenue, snapshot.month_expenses);
        snapshot.revenue_growth = growth(snapshot.month_revenue, snapshot.previous_month_revenue);

        let mut categories: Vec<(String, f64)> = by_category
            .into_iter()
            .map(|(name, amount)| (name.to_string(), amount))
            .collect();
        categories.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        categories.truncate(TOP_CATEGORIES);
        snapshot.top_expense_categories = categories;

        snapshot
    }

    /// Rule-based observations about the user's position.
    pub fn insights(&self) -> Vec<&'static str> {
        let mut out = Vec::new();

        if self.total_balance < 0.0 {
            out.push(
                "Tu balance total es negativo. Considera revisar tus gastos y establecer un plan para reducir deudas.",
            );
        } else if self.total_balance < self.month_expenses {
            out.push(
                "Tu balance total es menor que tus gastos mensuales. Esto podría indicar un riesgo de liquidez.",
            );
        }

        if self.month_expenses > self.month_revenue {
            out.push(
                "Tus gastos son mayores que tus ingresos este mes. Esto puede llevar a problemas financieros si continúa.",
            );
        }

        if self.gross_margin < 15.0 {
            out.push(
                "Tu margen bruto está por debajo del 15%, lo cual es bajo para la mayoría de los negocios.",
            );
        }

        if self.month_fixed_costs > self.month_revenue * 0.5 {
            out.push(
                "Tus costos fijos representan más del 50% de tus ingresos, lo que puede limitar tu flexibilidad financiera.",
            );
        }

        out
    }

    /// Rule-based suggestions.
    pub fn recommendations(&self) -> Vec<&'static str> {
        let mut out = Vec::new();

        if self.revenue_growth < 0.0 {
            out.push(
                "Busca diversificar tus fuentes de ingresos ya que has experimentado una disminución en ingresos.",
            );
        }

        if self.month_variable_costs > self.month_revenue * 0.3 {
            out.push(
                "Considera revisar tus gastos variables que representan más del 30% de tus ingresos.",
            );
        }

        if self.savings_balance < self.month_expenses * 3.0 {
            out.push(
                "Intenta aumentar tus ahorros para tener un fondo de emergencia equivalente a 3-6 meses de gastos.",
            );
        }

        out
    }

    pub fn render(&self) -> String {
        let mut lines = vec!["Información financiera del usuario:".to_string()];

        if let Some(name) = &self.display_name {
            lines.push(format!("Nombre: {name}"));
        }
        lines.push(format!("Balance total: S/. {}", format_amount(self.total_balance)));
        lines.push(format!("Saldo de ahorros: S/. {}", format_amount(self.savings_balance)));
        lines.push(format!(
            "Ingresos del mes actual: S/. {}",
            format_amount(self.month_revenue)
        ));
        lines.push(format!(
            "Gastos del mes actual: S/. {}",
            format_amount(self.month_expenses)
        ));
        lines.push(format!(
            "Costos fijos del mes: S/. {}",
            format_amount(self.month_fixed_costs)
        ));
        lines.push(format!(
            "Costos variables del mes: S/. {}",
            format_amount(self.month_variable_costs)
        ));
        lines.push(format!("Margen bruto: {:.1}%", self.gross_margin));
        lines.push(format!("Crecimiento de ingresos: {:.1}%", self.revenue_growth));

        let mut out = lines.join("\n");

        if !self.top_expense_categories.is_empty() {
            out.push_str("\n\nCategorías de gastos principales:");
            for (category, amount) in &self.top_expense_categories {
                out.push_str(&format!("\n- {category}: S/. {}", format_amount(*amount)));
            }
        }

        let observations: Vec<&str> = self
            .insights()
            .into_iter()
            .chain(self.recommendations())
            .collect();
        if !observations.is_empty() {
            out.push_str("\n\nObservaciones:");
            for o in observations {
                out.push_str(&format!("\n- {o}"));
            }
        }

        out
    }
}

/// Builds financial snapshots from a [`LedgerSource`].
pub struct FinancialContextBuilder {
    ledger: Arc<dyn LedgerSource>,
    as_of: Option<NaiveDate>,
}

impl FinancialContextBuilder {
    pub fn new(ledger: Arc<dyn LedgerSource>) -> Self {
        Self { ledger, as_of: None }
    }

    /// Pin the reference date instead of using today.
    pub fn with_as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    async fn load(&self, user_id: &str) -> Result<FinancialSnapshot, neutro_core::LedgerError> {
        let transactions = self.ledger.transactions(user_id).await?;
        let savings: f64 = self
            .ledger
            .savings(user_id)
            .await?
            .iter()
            .map(|s| s.amount)
            .sum();
        let display_name = self
            .ledger
            .display_name(user_id)
            .await?
            .and_then(|n| n.split_whitespace().next().map(String::from));

        let as_of = self.as_of.unwrap_or_else(|| Local::now().date_naive());
        Ok(FinancialSnapshot::compute(&transactions, savings, display_name, as_of))
    }
}

#[async_trait]
impl ContextBuilder for FinancialContextBuilder {
    async fn snapshot(&self, session: &ChatSession) -> Option<ContextSnapshot> {
        let user_id = session.user_id()?;
        match self.load(user_id).await {
            Ok(snapshot) => {
                debug!(user_id, balance = snapshot.total_balance, "Financial snapshot built");
                Some(ContextSnapshot::Financial(snapshot))
            }
            Err(e) => {
                warn!(user_id, error = %e, "Ledger unavailable, sending without context");
                None
            }
        }
    }
}

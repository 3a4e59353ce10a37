//! Reply post-processing: lightweight markup to HTML, plus colour classes
//! around the financial figures the finance persona reports.
//!
//! Colourisation runs first, on the raw text, so the label patterns see the
//! model's wording before any tags are inserted. The transform is a single
//! pass and is not idempotent: formatting already formatted output may wrap
//! values twice.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::context::ContextSnapshot;

pub const POSITIVE: &str = "financial-positive";
pub const NEGATIVE: &str = "financial-negative";
pub const NEUTRAL: &str = "financial-neutral";

/// Comparative values closer to zero than this are neutral.
const COMPARATIVE_NEUTRAL_BAND: f64 = 0.5;

const VALUE: &str = r"(-?\d[\d,]*(?:\.\d+)?)";

/// How a labelled figure is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Figure {
    /// `S/.` amount, higher is better
    Amount,
    /// `S/.` amount, lower is better
    Cost,
    /// Percentage compared against zero
    Percent,
}

struct LabelRule {
    label: &'static str,
    pattern: Regex,
    figure: Figure,
}

fn label_rule(label: &'static str, figure: Figure) -> LabelRule {
    let pattern = match figure {
        Figure::Amount | Figure::Cost => format!(r"(?i)({label}):?[ \t]*S/\.[ \t]*{VALUE}"),
        Figure::Percent => format!(r"(?i)({label}):?[ \t]*{VALUE}%"),
    };
    LabelRule {
        label,
        pattern: Regex::new(&pattern).unwrap(),
        figure,
    }
}

static LABEL_RULES: LazyLock<Vec<LabelRule>> = LazyLock::new(|| {
    vec![
        label_rule("Balance total", Figure::Amount),
        label_rule("Saldo de ahorros", Figure::Amount),
        label_rule("Ingresos del mes actual", Figure::Amount),
        label_rule("Gastos del mes actual", Figure::Cost),
        label_rule("Costos fijos del mes", Figure::Cost),
        label_rule("Costos variables del mes", Figure::Cost),
        label_rule("Margen bruto", Figure::Percent),
        label_rule("Crecimiento de ingresos", Figure::Percent),
    ]
});

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*•[ \t]+(.+?)[ \t]*$").unwrap());

static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)(\d+)\.[ \t]+").unwrap());

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([A-Za-zÀ-ÿ][A-Za-zÀ-ÿ ]*):(?:[ \t]+|$)").unwrap());

static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*\n]+)\*\*").unwrap());

/// Colour class for a value.
///
/// Absolute figures are neutral only at exactly zero; comparative figures
/// (margin, growth) are neutral inside ±0.5.
pub fn value_class(value: f64, comparative: bool) -> &'static str {
    let neutral = if comparative {
        value.abs() < COMPARATIVE_NEUTRAL_BAND
    } else {
        value == 0.0
    };
    if neutral {
        NEUTRAL
    } else if value > 0.0 {
        POSITIVE
    } else {
        NEGATIVE
    }
}

fn parse_value(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

#[derive(Debug, Clone, Default)]
pub struct ResponseFormatter {
    financial_colors: bool,
}

impl ResponseFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always colourise labelled figures, even without a financial snapshot.
    pub fn with_financial_colors(mut self, enabled: bool) -> Self {
        self.financial_colors = enabled;
        self
    }

    pub fn format(&self, raw: &str, snapshot: Option<&ContextSnapshot>) -> String {
        let colorize =
            self.financial_colors || snapshot.and_then(ContextSnapshot::as_financial).is_some();

        let text = if colorize {
            colorize_figures(raw)
        } else {
            raw.to_string()
        };
        render_markup(&text)
    }
}

/// Wrap every recognised labelled figure in a colour span.
pub fn colorize_figures(text: &str) -> String {
    let mut out = text.to_string();
    for rule in LABEL_RULES.iter() {
        out = rule
            .pattern
            .replace_all(&out, |caps: &Captures| {
                let label = rule.label;
                let raw = &caps[2];
                let Some(value) = parse_value(raw) else {
                    return caps[0].to_string();
                };
                match rule.figure {
                    Figure::Amount => {
                        format!(r#"{label}: <span class="{}">S/. {raw}</span>"#, value_class(value, false))
                    }
                    Figure::Cost => {
                        format!(r#"{label}: <span class="{}">S/. {raw}</span>"#, value_class(-value, false))
                    }
                    Figure::Percent => {
                        format!(r#"{label}: <span class="{}">{raw}%</span>"#, value_class(value, true))
                    }
                }
            })
            .into_owned();
    }
    out
}

/// Convert the reply's lightweight markup into HTML.
pub fn render_markup(text: &str) -> String {
    let text = BULLET_RE.replace_all(text, "<li>$1</li>");
    let text = NUMBERED_RE.replace_all(&text, "$1$2 ");
    let text = LABEL_RE.replace_all(&text, |caps: &Captures| {
        if caps[0].ends_with(':') {
            format!("<strong>{}:</strong>", &caps[1])
        } else {
            format!("<strong>{}:</strong> ", &caps[1])
        }
    });
    let text = BOLD_RE.replace_all(&text, "<strong>$1</strong>");

    text.replace("</li>\n<li>", "</li><li>")
        .replace("\n\n", "</p><p>")
        .replace('\n', "<br>")
}

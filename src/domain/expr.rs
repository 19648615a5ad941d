// src/domain/expr.rs
//! Infix boolean expressions produced by the translator

use super::token::{CompareOp, Condition};

/// Binary tree of boolean nodes over field comparisons
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoolExpr {
    /// A rendered comparison (`state == 'draft'`) or a bare field (`active`)
    Literal(String),
    Not(Box<BoolExpr>),
    And(Box<BoolExpr>, Box<BoolExpr>),
    Or(Box<BoolExpr>, Box<BoolExpr>),
}

impl BoolExpr {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn not(inner: BoolExpr) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn and(lhs: BoolExpr, rhs: BoolExpr) -> Self {
        Self::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: BoolExpr, rhs: BoolExpr) -> Self {
        Self::Or(Box::new(lhs), Box::new(rhs))
    }

    /// Build the literal for one condition, applying value normalization
    ///
    /// Boolean and empty-list comparisons collapse to the bare field or its
    /// negation; everything else keeps the value verbatim.
    pub fn from_condition(cond: &Condition) -> Self {
        let field = cond.field.as_str();
        let value = cond.value.trim();
        let empty_list = matches!(value, "[]" | "()");

        match cond.op {
            CompareOp::Eq if value == "False" || empty_list => Self::not(Self::literal(field)),
            CompareOp::Eq if value == "True" => Self::literal(field),
            CompareOp::Ne if value == "False" || empty_list => Self::literal(field),
            CompareOp::Ne if value == "True" => Self::not(Self::literal(field)),
            op => Self::literal(format!("{} {} {}", field, op.infix(), cond.value)),
        }
    }

    /// Render as infix text
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn binary_op(&self) -> Option<&'static str> {
        match self {
            Self::And(..) => Some("and"),
            Self::Or(..) => Some("or"),
            _ => None,
        }
    }

    fn fmt_operand(&self, parent: &'static str, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.binary_op() {
            Some(op) if op != parent => write!(f, "({})", self),
            _ => write!(f, "{}", self),
        }
    }
}

impl std::fmt::Display for BoolExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(text) => write!(f, "{}", text),
            Self::Not(inner) if inner.binary_op().is_some() => write!(f, "not ({})", inner),
            Self::Not(inner) => write!(f, "not {}", inner),
            Self::And(lhs, rhs) => {
                lhs.fmt_operand("and", f)?;
                write!(f, " and ")?;
                rhs.fmt_operand("and", f)
            }
            Self::Or(lhs, rhs) => {
                lhs.fmt_operand("or", f)?;
                write!(f, " or ")?;
                rhs.fmt_operand("or", f)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(field: &str, op: CompareOp, value: &str) -> BoolExpr {
        BoolExpr::from_condition(&Condition::new(field, op, value))
    }

    #[test]
    fn test_value_normalization() {
        assert_eq!(cond("active", CompareOp::Eq, "False").render(), "not active");
        assert_eq!(cond("line_ids", CompareOp::Eq, "[]").render(), "not line_ids");
        assert_eq!(cond("active", CompareOp::Eq, "True").render(), "active");
        assert_eq!(cond("active", CompareOp::Ne, "False").render(), "active");
        assert_eq!(cond("active", CompareOp::Ne, "True").render(), "not active");
        assert_eq!(cond("line_ids", CompareOp::Ne, "[]").render(), "line_ids");
    }

    #[test]
    fn test_value_passthrough() {
        assert_eq!(cond("state", CompareOp::Eq, "'draft'").render(), "state == 'draft'");
        assert_eq!(cond("name", CompareOp::Ne, "\"x\"").render(), "name != \"x\"");
        assert_eq!(cond("qty", CompareOp::Ge, "10").render(), "qty >= 10");
        assert_eq!(
            cond("state", CompareOp::NotIn, "['done', 'cancel']").render(),
            "state not in ['done', 'cancel']"
        );
    }

    #[test]
    fn test_grouping_only_when_operators_mix() {
        let a = BoolExpr::literal("a");
        let b = BoolExpr::literal("b");
        let c = BoolExpr::literal("c");

        let same = BoolExpr::or(a.clone(), BoolExpr::or(b.clone(), c.clone()));
        assert_eq!(same.render(), "a or b or c");

        let mixed = BoolExpr::or(a.clone(), BoolExpr::and(b.clone(), c.clone()));
        assert_eq!(mixed.render(), "a or (b and c)");

        let left = BoolExpr::and(BoolExpr::or(a, b), c);
        assert_eq!(left.render(), "(a or b) and c");
    }

    #[test]
    fn test_not_rendering() {
        let negated = BoolExpr::not(BoolExpr::and(BoolExpr::literal("a"), BoolExpr::literal("b")));
        assert_eq!(negated.render(), "not (a and b)");

        let in_or = BoolExpr::or(BoolExpr::not(BoolExpr::literal("a")), BoolExpr::literal("b"));
        assert_eq!(in_or.render(), "not a or b");
    }
}

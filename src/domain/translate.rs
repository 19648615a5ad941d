// src/domain/translate.rs
//! Prefix-to-infix translation with an explicit operand stack

use super::error::ParseError;
use super::expr::BoolExpr;
use super::token::{self, Token};
use serde::{Deserialize, Serialize};

/// How much of the domain language the translator accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionParsing {
    /// Single condition, flat implicit-AND list, or one OR over two conditions
    Basic,
    /// Arbitrary nesting of AND/OR/NOT
    #[default]
    Advanced,
}

/// Operator frame waiting for its operands
struct Pending {
    marker: Token,
    operands: Vec<BoolExpr>,
}

impl Pending {
    fn arity(&self) -> usize {
        if self.marker == Token::Not { 1 } else { 2 }
    }

    fn is_full(&self) -> bool {
        self.operands.len() == self.arity()
    }

    fn combine(mut self) -> BoolExpr {
        let rhs = self.operands.pop();
        let lhs = self.operands.pop();
        match (self.marker, lhs, rhs) {
            (Token::And, Some(lhs), Some(rhs)) => BoolExpr::and(lhs, rhs),
            (Token::Or, Some(lhs), Some(rhs)) => BoolExpr::or(lhs, rhs),
            (_, None, Some(inner)) => BoolExpr::not(inner),
            // combine() is only called on full frames
            _ => unreachable!("incomplete operator frame"),
        }
    }
}

/// Translate a well-formed prefix token sequence into an expression tree
///
/// Operator markers push a pending frame; each completed operand is offered
/// to the innermost frame, and full frames collapse into a node that is in
/// turn offered upward. Anything other than exactly one remaining operand
/// is malformed.
pub fn translate(tokens: &[Token]) -> Result<BoolExpr, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let triples = tokens.iter().filter(|t| matches!(t, Token::Cond(_))).count();
    let operators = tokens.iter().filter(|t| t.is_binary()).count();
    let malformed = ParseError::Malformed { triples, operators };

    let mut stack: Vec<Pending> = Vec::new();
    let mut result: Option<BoolExpr> = None;

    for token in tokens {
        if result.is_some() {
            // Input continues after the expression already closed
            return Err(malformed);
        }

        let mut operand = match token {
            Token::Cond(cond) => BoolExpr::from_condition(cond),
            marker => {
                stack.push(Pending {
                    marker: marker.clone(),
                    operands: Vec::with_capacity(2),
                });
                continue;
            }
        };

        loop {
            match stack.last_mut() {
                None => {
                    result = Some(operand);
                    break;
                }
                Some(frame) => {
                    frame.operands.push(operand);
                    if !frame.is_full() {
                        break;
                    }
                    let Some(full) = stack.pop() else { break };
                    operand = full.combine();
                }
            }
        }
    }

    match result {
        Some(expr) if stack.is_empty() => Ok(expr),
        _ => Err(malformed),
    }
}

/// Shapes the original converter could handle
fn is_basic_shape(tokens: &[Token]) -> bool {
    let all_conditions = tokens.iter().all(|t| matches!(t, Token::Cond(_)));
    let single_or = tokens.len() == 3
        && tokens[0] == Token::Or
        && tokens[1..].iter().all(|t| matches!(t, Token::Cond(_)));
    all_conditions || single_or
}

/// Translate a serialized domain into an infix expression string
pub fn translate_domain(text: &str, mode: ConditionParsing) -> Result<String, ParseError> {
    let tokens = token::tokenize(text)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    if mode == ConditionParsing::Basic && !is_basic_shape(&tokens) {
        return Err(ParseError::TooComplex);
    }

    let expr = translate(&token::normalize(tokens))?;
    Ok(expr.render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::token::{CompareOp, Condition};

    fn c(field: &str, op: CompareOp, value: &str) -> Token {
        Token::Cond(Condition::new(field, op, value))
    }

    #[test]
    fn test_translate_single() {
        let expr = translate(&[c("state", CompareOp::Eq, "'draft'")]).unwrap();
        assert_eq!(expr.render(), "state == 'draft'");

        let expr = translate(&[c("active", CompareOp::Eq, "False")]).unwrap();
        assert_eq!(expr.render(), "not active");
    }

    #[test]
    fn test_translate_or() {
        let tokens = [Token::Or, c("x", CompareOp::Eq, "1"), c("y", CompareOp::Eq, "2")];
        assert_eq!(translate(&tokens).unwrap().render(), "x == 1 or y == 2");
    }

    #[test]
    fn test_translate_nested_groups_mixed_operators() {
        let tokens = [
            Token::Or,
            c("x", CompareOp::Eq, "1"),
            Token::And,
            c("y", CompareOp::Eq, "2"),
            c("z", CompareOp::Eq, "3"),
        ];
        assert_eq!(
            translate(&tokens).unwrap().render(),
            "x == 1 or (y == 2 and z == 3)"
        );
    }

    #[test]
    fn test_translate_deep_nesting() {
        // & | a b | c ! d
        let tokens = [
            Token::And,
            Token::Or,
            c("a", CompareOp::Eq, "1"),
            c("b", CompareOp::Eq, "2"),
            Token::Or,
            c("c", CompareOp::Eq, "3"),
            Token::Not,
            c("d", CompareOp::Eq, "4"),
        ];
        assert_eq!(
            translate(&tokens).unwrap().render(),
            "(a == 1 or b == 2) and (c == 3 or not d == 4)"
        );
    }

    #[test]
    fn test_translate_malformed() {
        let missing_operand = [Token::Or, c("x", CompareOp::Eq, "1")];
        assert_eq!(
            translate(&missing_operand),
            Err(ParseError::Malformed { triples: 1, operators: 1 })
        );

        let missing_operator = [c("x", CompareOp::Eq, "1"), c("y", CompareOp::Eq, "2")];
        assert_eq!(
            translate(&missing_operator),
            Err(ParseError::Malformed { triples: 2, operators: 0 })
        );

        let dangling_not = [Token::Not];
        assert!(matches!(translate(&dangling_not), Err(ParseError::Malformed { .. })));

        assert_eq!(translate(&[]), Err(ParseError::Empty));
    }

    #[test]
    fn test_translate_domain_implicit_and() {
        let out = translate_domain(
            "[('state', '=', 'draft'), ('active', '=', True)]",
            ConditionParsing::Advanced,
        )
        .unwrap();
        assert_eq!(out, "state == 'draft' and active");
    }

    #[test]
    fn test_translate_domain_excess_operators() {
        let err = translate_domain("['|', '|', ('a', '=', 1), ('b', '=', 2)]", ConditionParsing::Advanced);
        assert_eq!(err, Err(ParseError::Malformed { triples: 2, operators: 2 }));
    }

    #[test]
    fn test_basic_mode_limits() {
        let flat = "[('a', '=', 1), ('b', '=', 2), ('c', '=', 3)]";
        assert_eq!(
            translate_domain(flat, ConditionParsing::Basic).unwrap(),
            "a == 1 and b == 2 and c == 3"
        );

        let simple_or = "['|', ('a', '=', 1), ('b', '=', 2)]";
        assert_eq!(
            translate_domain(simple_or, ConditionParsing::Basic).unwrap(),
            "a == 1 or b == 2"
        );

        let nested = "['|', ('a', '=', 1), '&', ('b', '=', 2), ('c', '=', 3)]";
        assert_eq!(translate_domain(nested, ConditionParsing::Basic), Err(ParseError::TooComplex));
        assert_eq!(
            translate_domain(nested, ConditionParsing::Advanced).unwrap(),
            "a == 1 or (b == 2 and c == 3)"
        );
    }

    #[test]
    fn test_translate_domain_empty() {
        assert_eq!(translate_domain("[]", ConditionParsing::Advanced), Err(ParseError::Empty));
    }
}

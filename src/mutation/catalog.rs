//! Fixed, ordered catalog of textual mutation rules.
//!
//! Each rule is a regex pattern plus a replacement template, applied to a
//! single line with "first match, replace once" semantics. Rules carry their
//! [`MutationCategory`] so downstream consumers never re-derive it from the
//! pattern text.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Fault class modelled by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationCategory {
    /// `+` becomes `-`.
    AddToSub,
    /// `-` becomes `+`.
    SubToAdd,
    /// `**` becomes `*`.
    PowToMul,
    /// `*` becomes `/`.
    MulToDiv,
    /// `/` becomes `*`.
    DivToMul,
    /// `%` becomes `/`.
    ModToDiv,
    /// `==` becomes `!=`.
    EqToNe,
    /// `!=` becomes `==`.
    NeToEq,
    /// Ordering comparison boundary swap.
    Relational,
    /// `and` becomes `or`.
    AndToOr,
    /// `or` becomes `and`.
    OrToAnd,
    /// `not ` is dropped.
    RemoveNot,
    /// Returned value is corrupted.
    ReturnValue,
    /// `raise ...` becomes `pass`.
    RaiseToPass,
    /// Boundary literal flip.
    Literal,
}

impl fmt::Display for MutationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AddToSub => "add_to_sub",
            Self::SubToAdd => "sub_to_add",
            Self::PowToMul => "pow_to_mul",
            Self::MulToDiv => "mul_to_div",
            Self::DivToMul => "div_to_mul",
            Self::ModToDiv => "mod_to_div",
            Self::EqToNe => "eq_to_ne",
            Self::NeToEq => "ne_to_eq",
            Self::Relational => "relational",
            Self::AndToOr => "and_to_or",
            Self::OrToAnd => "or_to_and",
            Self::RemoveNot => "remove_not",
            Self::ReturnValue => "return_value",
            Self::RaiseToPass => "raise_to_pass",
            Self::Literal => "literal",
        };
        f.write_str(name)
    }
}

/// One pattern/replacement rewrite rule.
#[derive(Debug, Clone)]
pub struct MutationRule {
    /// Regex source text.
    pub pattern: &'static str,
    /// Replacement template (`${1}` re-emits a guard capture).
    pub replacement: &'static str,
    /// Fault class.
    pub category: MutationCategory,
    /// Short human label, e.g. `+ -> -`.
    pub description: &'static str,
    regex: Regex,
}

impl MutationRule {
    /// Build a rule. Panics if `pattern` is not a valid regex, so only use
    /// this with literal patterns.
    pub fn new(
        pattern: &'static str,
        replacement: &'static str,
        category: MutationCategory,
        description: &'static str,
    ) -> Self {
        let regex = Regex::new(pattern).expect("catalog patterns are valid regexes");
        Self {
            pattern,
            replacement,
            category,
            description,
            regex,
        }
    }

    /// True if the pattern occurs in `line`.
    pub fn matches(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Byte range of the first occurrence of the pattern in `line`.
    pub fn find(&self, line: &str) -> Option<std::ops::Range<usize>> {
        self.regex.find(line).map(|m| m.range())
    }

    /// Replace the first occurrence of the pattern in `line`.
    ///
    /// Returns `None` when the pattern does not occur.
    pub fn apply_once(&self, line: &str) -> Option<String> {
        if !self.regex.is_match(line) {
            return None;
        }
        Some(self.regex.replacen(line, 1, self.replacement).into_owned())
    }
}

impl PartialEq for MutationRule {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
            && self.replacement == other.replacement
            && self.category == other.category
    }
}

impl Eq for MutationRule {}

static CATALOG: LazyLock<Vec<MutationRule>> = LazyLock::new(|| {
    use MutationCategory::*;

    vec![
        // Arithmetic. The crate's regex engine has no lookahead, so the
        // "not followed by" guards capture the next char and put it back.
        MutationRule::new(r"\+", "-", AddToSub, "+ -> -"),
        MutationRule::new(r"-([^>]|$)", "+${1}", SubToAdd, "- -> +"),
        MutationRule::new(r"\*\*", "*", PowToMul, "** -> *"),
        MutationRule::new(r"\*([^*]|$)", "/${1}", MulToDiv, "* -> /"),
        MutationRule::new(r"/", "*", DivToMul, "/ -> *"),
        MutationRule::new(r"%", "/", ModToDiv, "% -> /"),
        // Comparison.
        MutationRule::new(r"==", "!=", EqToNe, "== -> !="),
        MutationRule::new(r"!=", "==", NeToEq, "!= -> =="),
        MutationRule::new(r">", "<=", Relational, "> -> <="),
        MutationRule::new(r"<", ">=", Relational, "< -> >="),
        MutationRule::new(r">=", "<", Relational, ">= -> <"),
        MutationRule::new(r"<=", ">", Relational, "<= -> >"),
        // Boolean.
        MutationRule::new(r" and ", " or ", AndToOr, "and -> or"),
        MutationRule::new(r" or ", " and ", OrToAnd, "or -> and"),
        MutationRule::new(r"not ", "", RemoveNot, "not -> (removed)"),
        // Return values.
        MutationRule::new(r"return (.+)", "return True", ReturnValue, "return x -> return True"),
        MutationRule::new(r"return True", "return False", ReturnValue, "return True -> return False"),
        MutationRule::new(r"return False", "return True", ReturnValue, "return False -> return True"),
        // Exceptions.
        MutationRule::new(r"raise (.+)", "pass", RaiseToPass, "raise -> pass"),
        // Literals.
        MutationRule::new(r"\b0\b", "1", Literal, "0 -> 1"),
        MutationRule::new(r"\b1\b", "0", Literal, "1 -> 0"),
        MutationRule::new(r"\bTrue\b", "False", Literal, "True -> False"),
        MutationRule::new(r"\bFalse\b", "True", Literal, "False -> True"),
        MutationRule::new(r"\bNone\b", "True", Literal, "None -> True"),
    ]
});

/// The full ordered catalog.
pub fn catalog() -> &'static [MutationRule] {
    &CATALOG
}

/// Look up the first catalog rule with the given pattern text.
pub fn rule_by_pattern(pattern: &str) -> Option<&'static MutationRule> {
    catalog().iter().find(|rule| rule.pattern == pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str) -> &'static MutationRule {
        rule_by_pattern(pattern).expect("rule should exist in catalog")
    }

    #[test]
    fn catalog_has_fixed_order_and_size() {
        let rules = catalog();
        assert_eq!(rules.len(), 24);
        assert_eq!(rules[0].pattern, r"\+");
        assert_eq!(rules[18].category, MutationCategory::RaiseToPass);
        assert_eq!(rules[23].pattern, r"\bNone\b");
    }

    #[test]
    fn add_rule_replaces_first_occurrence_only() {
        assert_eq!(
            rule(r"\+").apply_once("    return a + b + c").as_deref(),
            Some("    return a - b + c")
        );
        assert_eq!(rule(r"\+").apply_once("    return a * b"), None);
        assert_eq!(rule(r"\+").find("    return a + b + c"), Some(13..14));
    }

    #[test]
    fn sub_rule_skips_arrows_and_keeps_guard_char() {
        let sub = rule(r"-([^>]|$)");
        assert_eq!(sub.apply_once("def f(a) -> int:"), None);
        assert_eq!(
            sub.apply_once("    return a - b").as_deref(),
            Some("    return a + b")
        );
        assert_eq!(sub.apply_once("x = a -").as_deref(), Some("x = a +"));
        assert_eq!(
            sub.apply_once("f(a) -> a - b").as_deref(),
            Some("f(a) -> a + b")
        );
    }

    #[test]
    fn mul_rule_skips_power_operator_prefix() {
        let mul = rule(r"\*([^*]|$)");
        assert_eq!(
            mul.apply_once("    return a * b").as_deref(),
            Some("    return a / b")
        );
        // The first `*` of `**` is guarded; the second one is not.
        assert_eq!(
            mul.apply_once("    return a ** b").as_deref(),
            Some("    return a */ b")
        );
        assert_eq!(
            rule(r"\*\*").apply_once("    return a ** 0.5").as_deref(),
            Some("    return a * 0.5")
        );
    }

    #[test]
    fn return_and_raise_rules_replace_whole_expression() {
        assert_eq!(
            rule("return (.+)").apply_once("    return a / b").as_deref(),
            Some("    return True")
        );
        assert_eq!(
            rule("raise (.+)")
                .apply_once("        raise ValueError(\"Cannot divide by zero\")")
                .as_deref(),
            Some("        pass")
        );
    }

    #[test]
    fn literal_rules_respect_word_boundaries() {
        let zero = rule(r"\b0\b");
        assert_eq!(zero.apply_once("    if b == 0:").as_deref(), Some("    if b == 1:"));
        assert_eq!(zero.apply_once("    x = 10"), None);
        assert_eq!(zero.apply_once("    x = 0.5").as_deref(), Some("    x = 1.5"));
        assert!(!rule(r"\bTrue\b").matches("    return Truest"));
    }

    #[test]
    fn relational_rules_are_blind_text_swaps() {
        assert_eq!(
            rule(">").apply_once("    if a >= b:").as_deref(),
            Some("    if a <== b:")
        );
        assert_eq!(
            rule(">=").apply_once("    if a >= b:").as_deref(),
            Some("    if a < b:")
        );
    }

    #[test]
    fn category_display_is_snake_case() {
        assert_eq!(MutationCategory::AddToSub.to_string(), "add_to_sub");
        assert_eq!(MutationCategory::RaiseToPass.to_string(), "raise_to_pass");
    }
}

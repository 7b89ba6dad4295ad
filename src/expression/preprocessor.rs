//! Expression preprocessor
//!
//! Canonicalizes the accepted surface variants into a single normalized
//! form before lexing, in strict order:
//!
//! 1. Symbolic operator normalization (`==`, `!~`, `&&`, lowercase
//!    `and`/`or`, …)
//! 2. Legacy fused negation canonicalization (`not_equals` → `not equals`)
//! 3. Pre-field modifier relocation (`not field op value` →
//!    `field not op value`)
//! 4. Whitespace collapse
//!
//! Idempotent for already-canonical input. Quoted string literals are
//! never rewritten; an operator symbol inside a value survives untouched.

use tracing::debug;

/// Run the full preprocessing pipeline. Empty or whitespace-only input
/// produces the empty string.
pub fn preprocess_expression(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let mut rewritten = canonicalize_legacy_fused_negations(&normalize_symbolic_operators(raw));
    let (relocated, changed) = relocate_pre_field_modifiers(&rewritten);
    if changed {
        debug!(
            "[EXPR_REWRITE] kind=pre_field_modifiers original='{}' rewritten='{}'",
            truncate_for_log(raw, 160),
            truncate_for_log(&relocated, 160)
        );
    }
    rewritten = relocated;

    collapse_whitespace(&rewritten)
}

/// Apply `transform` to the regions of `input` outside quoted string
/// literals, leaving the literals (including their quotes and escapes)
/// byte-for-byte intact.
fn map_unquoted_regions(input: &str, transform: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(input.len());
    let mut segment_start = 0;
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' || b == b'\'' {
            out.push_str(&transform(&input[segment_start..i]));

            // Copy the quoted literal verbatim, honouring escapes.
            let quote = b;
            let literal_start = i;
            i += 1;
            while i < bytes.len() {
                if bytes[i] == b'\\' && i + 1 < bytes.len() {
                    i += 2;
                    continue;
                }
                if bytes[i] == quote {
                    i += 1;
                    break;
                }
                i += 1;
            }
            out.push_str(&input[literal_start..i]);
            segment_start = i;
        } else {
            i += 1;
        }
    }

    out.push_str(&transform(&input[segment_start..]));
    out
}

/// Normalize symbolic operators to canonical snake_case operator tokens
/// plus the `not` modifier for negations, and logical symbols/lowercase
/// variants to `AND` / `OR`.
///
/// Replacement order matters: longer symbols first so `>=` never decays
/// into `> =`.
fn normalize_symbolic_operators(input: &str) -> String {
    map_unquoted_regions(input, |segment| {
        let mut s = segment.to_string();

        let replacements = [
            ("!~", " not matches "),
            ("=~", " matches "),
            ("!=", " not equals "),
            ("==", " equals "),
            (">=", " greater_than_or_equal "),
            ("<=", " less_than_or_equal "),
            (">", " greater_than "),
            ("<", " less_than "),
        ];
        for (pat, rep) in replacements {
            s = s.replace(pat, rep);
        }

        s = s.replace("&&", " AND ");
        s = s.replace("||", " OR ");

        // Lowercase textual variants, space-delimited to avoid rewriting
        // words that merely contain them.
        for (pat, rep) in [(" and ", " AND "), (" or ", " OR ")] {
            s = s.replace(pat, rep);
        }

        s
    })
}

/// Canonicalize legacy fused negated operator tokens (`not_equals`) back
/// into the modifier + operator form (`not equals`). Tolerant and
/// idempotent; input without fused forms is returned unchanged.
fn canonicalize_legacy_fused_negations(input: &str) -> String {
    map_unquoted_regions(input, |segment| {
        // Pad so the first/last token still matches the space-delimited
        // patterns; collapse removes the padding again later.
        let mut out = format!(" {segment} ");
        let mappings = [
            (" not_equals ", " not equals "),
            (" not_matches ", " not matches "),
            (" not_contains ", " not contains "),
            (" not_starts_with ", " not starts_with "),
            (" not_ends_with ", " not ends_with "),
        ];
        for (from, to) in mappings {
            out = out.replace(from, to);
        }
        out
    })
}

/// Relocate leading pre-field modifiers to mid-field form:
/// `not field op value` becomes `field not op value`. Only a modifier run
/// followed by an identifier triggers the rewrite, so `NOT (…)` is left
/// for the parser to reject. Leading whitespace is preserved.
fn relocate_pre_field_modifiers(input: &str) -> (String, bool) {
    let trimmed = input.trim_start();
    let leading_ws = &input[..input.len() - trimmed.len()];

    let mut modifiers: Vec<&str> = Vec::new();
    let mut rest = trimmed;
    loop {
        let Some(word_end) = rest.find(char::is_whitespace) else {
            // A bare modifier run with nothing after it; leave it alone.
            return (input.to_string(), false);
        };
        let word = &rest[..word_end];
        match word {
            "not" | "NOT" | "case_sensitive" | "CASE_SENSITIVE" => {
                modifiers.push(word);
                rest = rest[word_end..].trim_start();
            }
            _ => break,
        }
    }

    if modifiers.is_empty() {
        return (input.to_string(), false);
    }

    // The token after the modifiers must be an identifier (a field name);
    // anything else (parenthesis, quote) is not the legacy pre-field form.
    let field_end = rest
        .find(|c: char| c.is_whitespace())
        .unwrap_or(rest.len());
    let field = &rest[..field_end];
    if !field
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '@' || c == '$')
    {
        return (input.to_string(), false);
    }

    let remainder = rest[field_end..].trim_start();
    let mut rebuilt = String::with_capacity(input.len());
    rebuilt.push_str(leading_ws);
    rebuilt.push_str(field);
    rebuilt.push(' ');
    rebuilt.push_str(&modifiers.join(" ").to_lowercase());
    if !remainder.is_empty() {
        rebuilt.push(' ');
        rebuilt.push_str(remainder);
    }

    (rebuilt, true)
}

/// Collapse runs of whitespace outside string literals to single spaces
/// and trim the ends.
fn collapse_whitespace(input: &str) -> String {
    let collapsed = map_unquoted_regions(input, |segment| {
        let mut out = String::with_capacity(segment.len());
        let mut last_was_space = false;
        for ch in segment.chars() {
            if ch.is_whitespace() {
                if !last_was_space {
                    out.push(' ');
                    last_was_space = true;
                }
            } else {
                out.push(ch);
                last_was_space = false;
            }
        }
        out
    });
    collapsed.trim().to_string()
}

/// Safe log truncation to avoid flooding debug logs with huge expressions.
fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut out = String::with_capacity(max + 1);
        out.extend(s.chars().take(max));
        out.push('…');
        out
    }
}

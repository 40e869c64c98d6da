//! Pure patch application: text in, text out.
//!
//! Every transform first consults its guard, then plans a single
//! [`TextEdit`] span against the current text. Bytes outside that span are
//! never touched, so a rule that does not fire returns the input unchanged.

use crate::edit::TextEdit;
use crate::patch::errors::PatchError;
use crate::patch::rule::{Anchor, Marker, PatchRule, Transform};
use regex::Regex;

/// Planned effect of one rule against one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchPlan {
    Edit(TextEdit),
    NoOp(String),
}

/// Result of applying one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome carries the patched text"]
pub enum PatchOutcome {
    /// The rule fired; holds the full new text.
    Applied(String),
    /// The guard found the rule already satisfied.
    AlreadyApplied { reason: String },
}

impl PatchOutcome {
    pub fn fired(&self) -> bool {
        matches!(self, PatchOutcome::Applied(_))
    }
}

/// Apply `rule` to `text`.
pub fn apply_rule(text: &str, rule: &PatchRule) -> Result<PatchOutcome, PatchError> {
    match plan_rule(text, rule)? {
        PatchPlan::NoOp(reason) => Ok(PatchOutcome::AlreadyApplied { reason }),
        PatchPlan::Edit(edit) => {
            let patched = edit.apply(text).map_err(|source| PatchError::Edit {
                rule: rule.id.to_string(),
                source,
            })?;
            Ok(PatchOutcome::Applied(patched))
        }
    }
}

/// Convenience for callers that only want the resulting text.
pub fn patch_text(text: &str, rule: &PatchRule) -> Result<String, PatchError> {
    Ok(match apply_rule(text, rule)? {
        PatchOutcome::Applied(patched) => patched,
        PatchOutcome::AlreadyApplied { .. } => text.to_string(),
    })
}

/// Work out what `rule` would do to `text` without doing it.
pub fn plan_rule(text: &str, rule: &PatchRule) -> Result<PatchPlan, PatchError> {
    rule.validate()?;

    let plan = match &rule.transform {
        Transform::ReplaceKey { key, value } => plan_replace_key(text, key, value, false),
        Transform::ReplaceKeyIfDifferent { key, value } => {
            plan_replace_key(text, key, value, true)
        }
        Transform::AppendBlock { marker, block } => plan_append_block(text, marker, block),
        Transform::InsertAfterAnchor {
            anchor,
            identifier,
            line,
        } => plan_insert_after_anchor(text, anchor, identifier, line).map_err(|reason| {
            PatchError::MalformedTarget {
                rule: rule.id.to_string(),
                reason,
            }
        })?,
        Transform::InsertBeforeClosing {
            opening,
            closing,
            identifier,
            line,
        } => plan_insert_before_closing(text, opening, closing, identifier, line).map_err(
            |reason| PatchError::MalformedTarget {
                rule: rule.id.to_string(),
                reason,
            },
        )?,
    };

    // A span that would rewrite itself is a no-op too
    if let PatchPlan::Edit(edit) = &plan {
        if edit.is_noop(text) {
            return Ok(PatchPlan::NoOp(format!("{} produces no change", rule.id)));
        }
    }

    Ok(plan)
}

/// A `KEY=` declaration located in env-style text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLine<'a> {
    /// Byte offset of the line start.
    pub start: usize,
    /// Byte offset of the line end, excluding `\n` and a preceding `\r`.
    pub end: usize,
    pub commented: bool,
    /// Raw text after the first `=`.
    pub raw_value: &'a str,
}

fn key_pattern(key: &str) -> Regex {
    // `[ \t]` rather than `\s` keeps the match on a single line
    Regex::new(&format!(r"(?m)^#?[ \t]*{}=", regex::escape(key)))
        .expect("escaped key always forms a valid pattern")
}

/// Every line declaring `key`, commented or not, in file order.
pub fn find_key_lines<'a>(text: &'a str, key: &str) -> Vec<KeyLine<'a>> {
    key_pattern(key)
        .find_iter(text)
        .map(|m| {
            let start = m.start();
            let mut end = text[start..].find('\n').map_or(text.len(), |i| start + i);
            if text[..end].ends_with('\r') {
                end -= 1;
            }
            KeyLine {
                start,
                end,
                commented: text[start..].starts_with('#'),
                raw_value: &text[m.end()..end.max(m.end())],
            }
        })
        .collect()
}

/// The line a key rule operates on: first active declaration, else first
/// commented one.
fn target_key_line<'a>(text: &'a str, key: &str) -> Option<KeyLine<'a>> {
    let lines = find_key_lines(text, key);
    let active = lines.iter().position(|l| !l.commented);
    match active {
        Some(idx) => lines.into_iter().nth(idx),
        None => lines.into_iter().next(),
    }
}

/// Interpret the value part of an env line the way dotenv loaders do:
/// surrounding quotes stripped, trailing ` # comment` dropped when unquoted.
pub fn parse_env_value(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    match trimmed.find(" #") {
        Some(idx) => trimmed[..idx].trim_end(),
        None => trimmed,
    }
}

fn plan_replace_key(text: &str, key: &str, value: &str, only_if_different: bool) -> PatchPlan {
    let Some(line) = target_key_line(text, key) else {
        return PatchPlan::NoOp(format!("key {key} absent"));
    };

    let desired = format!("{key}={value}");
    if &text[line.start..line.end] == desired {
        return PatchPlan::NoOp(format!("{key} already set"));
    }
    // A commented declaration has no value in effect
    if only_if_different && !line.commented && parse_env_value(line.raw_value) == value {
        return PatchPlan::NoOp(format!("{key} already has the target value"));
    }

    PatchPlan::Edit(TextEdit::new(line.start, line.end, desired))
}

fn plan_append_block(text: &str, marker: &Marker, block: &str) -> PatchPlan {
    let present = match marker {
        Marker::Key(key) => key_pattern(key).is_match(text),
        Marker::Substring(needle) => text.contains(needle.as_str()),
    };
    if present {
        return PatchPlan::NoOp(format!("{marker} already present"));
    }

    let eol = line_ending(text);
    let blank = format!("{eol}{eol}");
    let separator = if text.is_empty() || text.ends_with(blank.as_str()) {
        ""
    } else if text.ends_with('\n') {
        eol
    } else {
        blank.as_str()
    };

    let block = with_line_ending(block, eol);
    let mut new_text = String::with_capacity(separator.len() + block.len() + eol.len());
    new_text.push_str(separator);
    new_text.push_str(&block);
    if !block.ends_with('\n') {
        new_text.push_str(eol);
    }

    PatchPlan::Edit(TextEdit::insert(text.len(), new_text))
}

fn plan_insert_after_anchor(
    text: &str,
    anchor: &Anchor,
    identifier: &str,
    line: &str,
) -> Result<PatchPlan, String> {
    if text.contains(identifier) {
        return Ok(PatchPlan::NoOp(format!("'{identifier}' already present")));
    }

    let Anchor::Line(marker) = anchor;
    let mut offset = 0;
    let mut found = None;
    for raw in text.split_inclusive('\n') {
        if raw.trim() == marker.as_str() {
            found = Some(offset + raw.len());
            break;
        }
        offset += raw.len();
    }
    let Some(after_anchor) = found else {
        return Err(format!("anchor {anchor} not found"));
    };

    let eol = line_ending(text);
    let mut new_line = line.trim_end_matches(['\r', '\n']).to_string();
    new_line.push_str(eol);

    if !text[..after_anchor].ends_with('\n') {
        // Anchor is the last line and has no terminator
        return Ok(PatchPlan::Edit(TextEdit::insert(
            after_anchor,
            format!("{eol}{new_line}"),
        )));
    }

    // Keep a blank line that directly follows the anchor in front of us
    let rest = &text[after_anchor..];
    let insert_at = match rest.split_inclusive('\n').next() {
        Some(next) if next.trim().is_empty() && next.ends_with('\n') => after_anchor + next.len(),
        _ => after_anchor,
    };

    Ok(PatchPlan::Edit(TextEdit::insert(insert_at, new_line)))
}

const ELEMENT_INDENT: &str = "    ";

fn plan_insert_before_closing(
    text: &str,
    opening: &str,
    closing: &str,
    identifier: &str,
    line: &str,
) -> Result<PatchPlan, String> {
    if text.contains(identifier) {
        return Ok(PatchPlan::NoOp(format!("'{identifier}' already present")));
    }

    let open_start = text
        .find(opening)
        .ok_or_else(|| format!("opening marker '{opening}' not found"))?;
    let open_end = open_start + opening.len();
    let close_pos = text[open_end..]
        .rfind(closing)
        .map(|i| open_end + i)
        .ok_or_else(|| format!("closing marker '{closing}' not found after '{opening}'"))?;

    let eol = line_ending(text);
    let element = format!("{ELEMENT_INDENT}{}{eol}", line.trim());

    let body = &text[..close_pos];
    let last_content = body.trim_end().len();

    // The previous element needs a separating comma, placed after its code
    // and ahead of any trailing comment.
    let code_end = last_code_end(text, open_end, close_pos)?;
    let comma_at = code_end.filter(|&end| !text[..end].ends_with(','));
    let (edit_start, comma) = match comma_at {
        Some(end) => (end, ","),
        None => (last_content, ""),
    };
    let kept = &text[edit_start..last_content];

    let line_start = body.rfind('\n').map_or(0, |i| i + 1);
    let closing_on_own_line = line_start >= open_end && body[line_start..].trim().is_empty();

    let new_text = if closing_on_own_line {
        // Keep the gap before the closing line as-is, add our element last
        format!("{comma}{kept}{}{element}", &body[last_content..line_start])
    } else {
        format!("{comma}{kept}{eol}{element}")
    };

    let span_end = if closing_on_own_line {
        line_start
    } else {
        close_pos
    };

    Ok(PatchPlan::Edit(TextEdit::new(
        edit_start,
        span_end,
        new_text,
    )))
}

/// End offset of the last code in `text[from..to]`, skipping blank lines and
/// line comments. `None` when the range holds no code at all.
fn last_code_end(text: &str, from: usize, to: usize) -> Result<Option<usize>, String> {
    let mut end = to;
    loop {
        let start = text[from..end].rfind('\n').map_or(from, |i| from + i + 1);
        let code = strip_line_comment(&text[start..end])?.trim_end();
        if code.ends_with("*/") {
            return Err("block comment after the last element".to_string());
        }
        if !code.trim_start().is_empty() {
            return Ok(Some(start + code.len()));
        }
        if start == from {
            return Ok(None);
        }
        end = start - 1;
    }
}

/// The part of a PHP line before a `//` or `#` comment.
fn strip_line_comment(line: &str) -> Result<&str, String> {
    let mut quote = None;
    let mut chars = line.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if let Some(q) = quote {
            if c == '\\' {
                chars.next();
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '#' => return Ok(&line[..idx]),
            '/' => match chars.peek() {
                Some((_, '/')) => return Ok(&line[..idx]),
                Some((_, '*')) => {
                    return Err("block comment after the last element".to_string())
                }
                _ => {}
            },
            _ => {}
        }
    }
    Ok(line)
}

/// `\r\n` when the text already uses it, else `\n`.
fn line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

fn with_line_ending(block: &str, eol: &str) -> String {
    let normalized = block.replace("\r\n", "\n");
    if eol == "\n" {
        normalized
    } else {
        normalized.replace('\n', eol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::rule::Condition;

    const PROVIDERS: &str = "<?php\n\nreturn [\n    App\\Providers\\AppServiceProvider::class,\n];\n";

    fn provider_rule(class: &str) -> PatchRule {
        let line = format!("App\\Providers\\{class}::class,");
        PatchRule::insert_before_closing(
            "provider",
            "return [",
            "];",
            format!("App\\Providers\\{class}::class"),
            line,
        )
    }

    #[test]
    fn test_replace_commented_key() {
        let env = "DB_CONNECTION=pgsql\n# DB_HOST=\n# DB_PORT=3306\n";
        let rule = PatchRule::replace_key("db-host", "DB_HOST", "127.0.0.1");
        let out = patch_text(env, &rule).unwrap();
        assert_eq!(out, "DB_CONNECTION=pgsql\nDB_HOST=127.0.0.1\n# DB_PORT=3306\n");
    }

    #[test]
    fn test_replace_key_prefers_active_line() {
        let env = "#QUEUE_CONNECTION=sync\nQUEUE_CONNECTION=database\n";
        let rule = PatchRule::replace_key("queue", "QUEUE_CONNECTION", "redis");
        let out = patch_text(env, &rule).unwrap();
        assert_eq!(out, "#QUEUE_CONNECTION=sync\nQUEUE_CONNECTION=redis\n");
    }

    #[test]
    fn test_replace_key_absent_is_noop() {
        let env = "APP_NAME=Laravel\n";
        let rule = PatchRule::replace_key("db-host", "DB_HOST", "127.0.0.1");
        let outcome = apply_rule(env, &rule).unwrap();
        assert!(!outcome.fired());
    }

    #[test]
    fn test_replace_key_is_case_sensitive_and_anchored() {
        let env = "db_host=x\nMY_DB_HOST=y\n  DB_HOST_RO=z\n";
        let rule = PatchRule::replace_key("db-host", "DB_HOST", "127.0.0.1");
        assert_eq!(patch_text(env, &rule).unwrap(), env);
    }

    #[test]
    fn test_replace_key_keeps_crlf() {
        let env = "A=1\r\n# DB_HOST=\r\nB=2\r\n";
        let rule = PatchRule::replace_key("db-host", "DB_HOST", "db");
        assert_eq!(patch_text(env, &rule).unwrap(), "A=1\r\nDB_HOST=db\r\nB=2\r\n");
    }

    #[test]
    fn test_replace_key_last_line_without_newline() {
        let env = "A=1\nDB_PORT=3306";
        let rule = PatchRule::replace_key("db-port", "DB_PORT", "5432");
        assert_eq!(patch_text(env, &rule).unwrap(), "A=1\nDB_PORT=5432");
    }

    #[test]
    fn test_if_different_skips_equal_quoted_value() {
        let env = "REDIS_CLIENT=\"phpredis\"\n";
        let rule = PatchRule::replace_key_if_different("redis", "REDIS_CLIENT", "phpredis");
        assert!(!apply_rule(env, &rule).unwrap().fired());

        // Unconditional replace normalises the line
        let rule = PatchRule::replace_key("redis", "REDIS_CLIENT", "phpredis");
        assert_eq!(patch_text(env, &rule).unwrap(), "REDIS_CLIENT=phpredis\n");
    }

    #[test]
    fn test_if_different_rewrites_other_value() {
        let env = "QUEUE_CONNECTION=database # default\n";
        let rule = PatchRule::replace_key_if_different("queue", "QUEUE_CONNECTION", "redis");
        assert_eq!(patch_text(env, &rule).unwrap(), "QUEUE_CONNECTION=redis\n");
    }

    #[test]
    fn test_if_different_uncomments_equal_value() {
        let env = "#QUEUE_CONNECTION=redis\n";
        let rule = PatchRule::replace_key_if_different("queue", "QUEUE_CONNECTION", "redis");
        let out = patch_text(env, &rule).unwrap();
        assert_eq!(out, "QUEUE_CONNECTION=redis\n");
        assert!(!apply_rule(&out, &rule).unwrap().fired());
    }

    #[test]
    fn test_parse_env_value() {
        assert_eq!(parse_env_value(" redis "), "redis");
        assert_eq!(parse_env_value("\"a b\""), "a b");
        assert_eq!(parse_env_value("'x'"), "x");
        assert_eq!(parse_env_value("redis # comment"), "redis");
        assert_eq!(parse_env_value(""), "");
    }

    #[test]
    fn test_append_block_with_separator() {
        let env = "APP_NAME=Laravel";
        let rule = PatchRule::append_block(
            "reverb",
            Marker::Key("REVERB_APP_ID".into()),
            "REVERB_APP_ID=1\nREVERB_APP_KEY=k",
        );
        let out = patch_text(env, &rule).unwrap();
        assert_eq!(out, "APP_NAME=Laravel\n\nREVERB_APP_ID=1\nREVERB_APP_KEY=k\n");
        assert_eq!(patch_text(&out, &rule).unwrap(), out);
    }

    #[test]
    fn test_append_block_respects_commented_marker() {
        let env = "#REVERB_APP_ID=\n";
        let rule = PatchRule::append_block(
            "reverb",
            Marker::Key("REVERB_APP_ID".into()),
            "REVERB_APP_ID=1\n",
        );
        assert!(!apply_rule(env, &rule).unwrap().fired());
    }

    #[test]
    fn test_append_block_rejects_block_without_marker() {
        let rule = PatchRule::append_block("bad", Marker::Substring("X".into()), "Y\n");
        assert!(matches!(
            apply_rule("", &rule),
            Err(PatchError::InvalidRule { .. })
        ));
    }

    #[test]
    fn test_insert_after_php_tag_keeps_blank_line() {
        let routes = "<?php\n\nuse Illuminate\\Support\\Facades\\Route;\n\nRoute::get('/', fn () => 'ok');\n";
        let rule = PatchRule::insert_after_line(
            "use-health",
            "<?php",
            "use App\\Http\\Controllers\\HealthController;",
        );
        let out = patch_text(routes, &rule).unwrap();
        assert_eq!(
            out,
            "<?php\n\nuse App\\Http\\Controllers\\HealthController;\nuse Illuminate\\Support\\Facades\\Route;\n\nRoute::get('/', fn () => 'ok');\n"
        );
        assert_eq!(patch_text(&out, &rule).unwrap(), out);
    }

    #[test]
    fn test_insert_after_anchor_without_trailing_newline() {
        let rule = PatchRule::insert_after_line("use", "<?php", "use A;");
        assert_eq!(patch_text("<?php", &rule).unwrap(), "<?php\nuse A;\n");
    }

    #[test]
    fn test_insert_after_missing_anchor_is_malformed() {
        let rule = PatchRule::insert_after_line("use", "<?php", "use A;");
        let err = apply_rule("Route::get('/');\n", &rule).unwrap_err();
        assert!(matches!(err, PatchError::MalformedTarget { .. }));
    }

    #[test]
    fn test_insert_provider_before_closing() {
        let out = patch_text(PROVIDERS, &provider_rule("PlatformServiceProvider")).unwrap();
        assert_eq!(
            out,
            "<?php\n\nreturn [\n    App\\Providers\\AppServiceProvider::class,\n    App\\Providers\\PlatformServiceProvider::class,\n];\n"
        );
    }

    #[test]
    fn test_insert_provider_adds_missing_comma() {
        let input = "<?php\n\nreturn [\n    App\\Providers\\AppServiceProvider::class\n];\n";
        let out = patch_text(input, &provider_rule("PlatformServiceProvider")).unwrap();
        assert_eq!(
            out,
            "<?php\n\nreturn [\n    App\\Providers\\AppServiceProvider::class,\n    App\\Providers\\PlatformServiceProvider::class,\n];\n"
        );
    }

    #[test]
    fn test_insert_provider_comma_goes_before_trailing_comment() {
        let input = "<?php\n\nreturn [\n    App\\Providers\\AppServiceProvider::class // core\n];\n";
        let out = patch_text(input, &provider_rule("PlatformServiceProvider")).unwrap();
        assert_eq!(
            out,
            "<?php\n\nreturn [\n    App\\Providers\\AppServiceProvider::class, // core\n    App\\Providers\\PlatformServiceProvider::class,\n];\n"
        );
    }

    #[test]
    fn test_insert_provider_skips_commented_out_element() {
        let input = "<?php\n\nreturn [\n    App\\Providers\\AppServiceProvider::class\n    # App\\Providers\\OldProvider::class\n];\n";
        let out = patch_text(input, &provider_rule("PlatformServiceProvider")).unwrap();
        assert_eq!(
            out,
            "<?php\n\nreturn [\n    App\\Providers\\AppServiceProvider::class,\n    # App\\Providers\\OldProvider::class\n    App\\Providers\\PlatformServiceProvider::class,\n];\n"
        );
    }

    #[test]
    fn test_insert_provider_after_block_comment_is_malformed() {
        let input = "<?php\n\nreturn [\n    App\\Providers\\AppServiceProvider::class /* core */\n];\n";
        let err = apply_rule(input, &provider_rule("PlatformServiceProvider")).unwrap_err();
        assert!(matches!(err, PatchError::MalformedTarget { .. }));
    }

    #[test]
    fn test_comment_marker_inside_string_is_code() {
        assert_eq!(strip_line_comment("'a#b' // c").unwrap(), "'a#b' ");
        assert_eq!(strip_line_comment("\"x\\\"//\" # y").unwrap(), "\"x\\\"//\" ");
    }

    #[test]
    fn test_insert_provider_keeps_crlf() {
        let input = "<?php\r\n\r\nreturn [\r\n    App\\Providers\\AppServiceProvider::class,\r\n];\r\n";
        let out = patch_text(input, &provider_rule("PlatformServiceProvider")).unwrap();
        assert_eq!(
            out,
            "<?php\r\n\r\nreturn [\r\n    App\\Providers\\AppServiceProvider::class,\r\n    App\\Providers\\PlatformServiceProvider::class,\r\n];\r\n"
        );
    }

    #[test]
    fn test_insert_after_anchor_keeps_crlf() {
        let rule = PatchRule::insert_after_line("use", "<?php", "use A;");
        let out = patch_text("<?php\r\n\r\nuse B;\r\n", &rule).unwrap();
        assert_eq!(out, "<?php\r\n\r\nuse A;\r\nuse B;\r\n");
    }

    #[test]
    fn test_append_block_keeps_crlf() {
        let rule = PatchRule::append_block(
            "reverb",
            Marker::Key("REVERB_APP_ID".into()),
            "REVERB_APP_ID=1\nREVERB_APP_KEY=k",
        );
        let out = patch_text("APP_NAME=Laravel\r\n", &rule).unwrap();
        assert_eq!(out, "APP_NAME=Laravel\r\n\r\nREVERB_APP_ID=1\r\nREVERB_APP_KEY=k\r\n");
    }

    #[test]
    fn test_insert_provider_into_empty_inline_array() {
        let out = patch_text("<?php\n\nreturn [];\n", &provider_rule("PlatformServiceProvider"))
            .unwrap();
        assert_eq!(
            out,
            "<?php\n\nreturn [\n    App\\Providers\\PlatformServiceProvider::class,\n];\n"
        );
    }

    #[test]
    fn test_insert_provider_missing_closing_is_malformed() {
        let err = apply_rule("<?php\n\nreturn [\n    A::class,\n", &provider_rule("B")).unwrap_err();
        assert!(matches!(err, PatchError::MalformedTarget { .. }));
    }

    #[test]
    fn test_insert_provider_missing_opening_is_malformed() {
        let err = apply_rule("<?php\n\n$providers = [];\n", &provider_rule("B")).unwrap_err();
        assert!(matches!(err, PatchError::MalformedTarget { .. }));
    }

    #[test]
    fn test_already_present_provider_is_noop_even_without_anchor() {
        let text = "App\\Providers\\B::class";
        assert!(!apply_rule(text, &provider_rule("B")).unwrap().fired());
    }

    #[test]
    fn test_precondition_is_not_evaluated_by_patcher() {
        let rule = PatchRule::replace_key("db", "DB_HOST", "x")
            .when(Condition::LineEquals("DB_CONNECTION=sqlite".into()));
        assert!(apply_rule("DB_HOST=y\n", &rule).unwrap().fired());
    }
}

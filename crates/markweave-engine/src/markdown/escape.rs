use std::sync::LazyLock;

use regex::Regex;

/// Matches a line start that would re-parse as an ordered list item
/// (`1. `, `23) `, a bare `7.` at end of line).
static ORDERED_LOOKALIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,9}[.)](\s|$)").expect("valid literal pattern"));

fn is_word(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_alphanumeric())
}

/// Escape the characters of `text` that would otherwise be re-parsed as
/// markup, without touching plain prose.
///
/// `at_line_start` enables the additional escapes that only matter at the
/// beginning of a block line (heading hashes, quote markers, list markers).
pub fn escape_inline(text: &str, at_line_start: bool) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let prev = if i > 0 { Some(chars[i - 1]) } else { None };
        let next = chars.get(i + 1).copied();
        let escape = match c {
            '\\' | '`' | '[' | ']' | '*' => true,
            // Intra-word underscores cannot open emphasis, so leaving them
            // alone keeps snake_case readable.
            '_' => !(is_word(prev) && is_word(next)),
            '<' => next.is_some_and(|n| n.is_ascii_alphabetic() || n == '/' || n == '!'),
            _ => false,
        };
        if escape {
            out.push('\\');
        }
        out.push(c);
    }
    if at_line_start {
        escape_line_start(&out)
    } else {
        out
    }
}

fn escape_line_start(line: &str) -> String {
    let trimmed = line.trim_start();
    let escape_first = match trimmed.chars().next() {
        Some('#') | Some('>') => true,
        Some('-') | Some('+') => {
            matches!(trimmed.chars().nth(1), None | Some(' ') | Some('\t'))
        }
        Some('=') => true,
        Some(c) if c.is_ascii_digit() => ORDERED_LOOKALIKE.is_match(trimmed),
        _ => false,
    };
    if !escape_first {
        return line.to_string();
    }
    let lead = line.len() - trimmed.len();
    if let Some(c) = trimmed.chars().next() {
        if c.is_ascii_digit() {
            // Escape the delimiter, not the digits: `1.` becomes `1\.`.
            let digits: usize = trimmed.chars().take_while(char::is_ascii_digit).count();
            return format!(
                "{}{}\\{}",
                &line[..lead],
                &trimmed[..digits],
                &trimmed[digits..]
            );
        }
    }
    format!("{}\\{}", &line[..lead], trimmed)
}

/// The shortest backtick fence that safely encloses inline code.
pub fn code_span_delim(text: &str, recorded: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in text.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    let needed = longest + 1;
    if recorded.chars().all(|c| c == '`') && recorded.len() >= needed {
        recorded.to_string()
    } else {
        "`".repeat(needed)
    }
}

/// Whether a code span's text needs space padding inside its fence.
pub fn code_span_needs_padding(text: &str) -> bool {
    text.starts_with('`') || text.ends_with('`')
}

/// Escape pipes so table cell content cannot terminate its cell early.
pub fn escape_table_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_prose_is_untouched() {
        assert_eq!(escape_inline("just words, 4 real.", true), "just words, 4 real.");
    }

    #[test]
    fn emphasis_delimiters_are_escaped() {
        assert_eq!(escape_inline("2 * 3 * 4", false), "2 \\* 3 \\* 4");
    }

    #[test]
    fn intra_word_underscore_survives() {
        assert_eq!(escape_inline("snake_case_name", false), "snake_case_name");
        assert_eq!(escape_inline("_lead", false), "\\_lead");
    }

    #[test]
    fn leading_hash_is_escaped_only_at_line_start() {
        assert_eq!(escape_inline("# not a heading", true), "\\# not a heading");
        assert_eq!(escape_inline("# inline", false), "# inline");
    }

    #[test]
    fn ordered_list_lookalike_is_defused() {
        assert_eq!(escape_inline("1. not a list", true), "1\\. not a list");
        assert_eq!(escape_inline("1.5 is a number", true), "1.5 is a number");
    }

    #[test]
    fn code_delim_grows_past_embedded_backticks() {
        assert_eq!(code_span_delim("a ` b", "`"), "``");
        assert_eq!(code_span_delim("plain", "`"), "`");
        assert_eq!(code_span_delim("plain", "``"), "``");
    }

    #[test]
    fn pipes_in_cells_are_escaped() {
        assert_eq!(escape_table_cell("a|b"), "a\\|b");
    }
}

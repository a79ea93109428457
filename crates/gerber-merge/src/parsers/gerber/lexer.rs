use crate::error::MergeError;

/// Tokens produced by the Gerber lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum GerberToken {
    /// One statement of a `%...%` parameter block, split into its two-letter
    /// code and the `*`-separated blocks that follow it.
    /// Example: `%FSTAX24Y24*%` gives code `"FS"`, blocks `["TAX24Y24"]`.
    Parameter { code: String, blocks: Vec<String> },
    /// A word terminated by `*`, upper-cased.
    /// Example: `"D10"`, `"X100Y200D01"`, `"G01"`, `"M02"`
    Word(String),
}

/// Tokenize a Gerber file line by line.
///
/// A line starting with `%` opens a parameter block; following lines are
/// appended until the `%` delimiters balance. Every other line is a run of
/// `*`-terminated words.
pub fn tokenize(input: &str) -> Result<Vec<GerberToken>, MergeError> {
    let mut tokens = Vec::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next() {
        let line = line.trim();
        if line.starts_with('%') {
            let mut block = line.to_string();
            while block.matches('%').count() % 2 != 0 {
                match lines.next() {
                    Some(next) => block.push_str(next.trim()),
                    None => return Err(MergeError::malformed("parameter block", block)),
                }
            }
            tokens.extend(
                block
                    .split('%')
                    .filter(|s| !s.is_empty())
                    .map(parameter),
            );
        } else {
            tokens.extend(
                line.to_uppercase()
                    .split('*')
                    .map(str::trim)
                    .filter(|w| !w.is_empty())
                    .map(|w| GerberToken::Word(w.to_string())),
            );
        }
    }

    Ok(tokens)
}

fn parameter(statement: &str) -> GerberToken {
    let split = statement
        .char_indices()
        .nth(2)
        .map_or(statement.len(), |(i, _)| i);
    let (code, rest) = statement.split_at(split);
    GerberToken::Parameter {
        code: code.to_uppercase(),
        blocks: rest
            .split('*')
            .filter(|b| !b.is_empty())
            .map(String::from)
            .collect(),
    }
}

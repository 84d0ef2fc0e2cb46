//! Field splitting for tracking lines.
//!
//! Lines use either `+` or `,` as the delimiter, chosen per line: if the line
//! contains a `+` anywhere it is the delimiter, otherwise `,` is. Fields may be
//! wrapped in double quotes to carry delimiters, with `""` standing for a
//! literal quote. An empty unquoted field is reported as `None`, a quoted empty
//! field as `Some("")`.

pub const PRIMARY_DELIMITER: char = '+';
pub const FALLBACK_DELIMITER: char = ',';
const QUOTE: char = '"';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizeError {
    pub column: usize,
    pub message: &'static str,
}

pub fn delimiter_for(line: &str) -> char {
    if line.contains(PRIMARY_DELIMITER) {
        PRIMARY_DELIMITER
    } else {
        FALLBACK_DELIMITER
    }
}

pub fn split_line(line: &str) -> Result<Vec<Option<String>>, TokenizeError> {
    split_with(line, delimiter_for(line))
}

pub fn split_with(line: &str, delimiter: char) -> Result<Vec<Option<String>>, TokenizeError> {
    let mut fields = Vec::new();
    let mut chars = line.chars().enumerate().peekable();

    loop {
        match chars.peek() {
            Some((_, c)) if *c == QUOTE => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some((_, QUOTE)) => {
                            if matches!(chars.peek(), Some((_, QUOTE))) {
                                chars.next();
                                value.push(QUOTE);
                            } else {
                                break;
                            }
                        }
                        Some((_, c)) => value.push(c),
                        None => {
                            return Err(TokenizeError {
                                column: line.chars().count(),
                                message: "unclosed quoted field",
                            })
                        }
                    }
                }
                fields.push(Some(value));
                match chars.next() {
                    None => return Ok(fields),
                    Some((_, c)) if c == delimiter => continue,
                    Some((column, _)) => {
                        return Err(TokenizeError {
                            column,
                            message: "unexpected characters after closing quote",
                        })
                    }
                }
            }
            _ => {
                let mut value = String::new();
                loop {
                    match chars.next() {
                        None => {
                            fields.push(non_empty(value));
                            return Ok(fields);
                        }
                        Some((_, c)) if c == delimiter => {
                            fields.push(non_empty(value));
                            break;
                        }
                        Some((column, QUOTE)) => {
                            return Err(TokenizeError {
                                column,
                                message: "illegal quote in unquoted field",
                            })
                        }
                        Some((_, c)) => value.push(c),
                    }
                }
            }
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

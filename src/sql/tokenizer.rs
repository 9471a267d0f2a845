use crate::errors;
use std::collections::VecDeque;

/// Splits a statement into tokens, respecting whitespace inside parentheses and quotes.
///
/// # Arguments
/// * `sql` - The raw statement to split.
///
/// # Returns
/// A `Result` containing a `VecDeque<String>` of tokens or an `errors::Error` if syntax is invalid.
pub fn tokenize_sql(sql: &str) -> Result<VecDeque<String>, errors::Error> {
    let mut result = VecDeque::new();
    let mut current = String::new();
    let mut inside_parens = false;
    let mut inside_text = false;

    for c in sql.chars() {
        match c {
            '\'' => {
                inside_text = !inside_text;
                current.push(c);
            }
            ')' => {
                if !inside_text {
                    if !inside_parens {
                        return Err(errors::Error::Syntax(
                            "Unmatched closing parenthesis.".to_owned(),
                        ));
                    }
                    inside_parens = false;
                }
                current.push(c);
            }
            '(' => {
                if !inside_text {
                    if inside_parens {
                        return Err(errors::Error::Syntax(
                            "Nested opening parenthesis.".to_owned(),
                        ));
                    }
                    inside_parens = true;
                }
                current.push(c);
            }
            c if c.is_whitespace() && !inside_parens && !inside_text => {
                if !current.is_empty() {
                    result.push_back(current);
                    current = String::new();
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        result.push_back(current);
    }
    if inside_parens {
        return Err(errors::Error::Syntax(
            "Missing closing parenthesis.".to_owned(),
        ));
    }
    if inside_text {
        return Err(errors::Error::Syntax("Unclosed text literal.".to_owned()));
    }

    Ok(result)
}

/// Splits `(a, b) (c, d)` or `(a, b),(c, d)` into the contents of each group.
pub fn split_groups(sql: &str) -> Result<Vec<String>, errors::Error> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut inside_parens = false;
    let mut inside_text = false;

    for c in sql.chars() {
        match c {
            '\'' if inside_parens => {
                inside_text = !inside_text;
                current.push(c);
            }
            '(' if !inside_text => {
                if inside_parens {
                    return Err(errors::Error::Syntax(
                        "Nested opening parenthesis.".to_owned(),
                    ));
                }
                inside_parens = true;
            }
            ')' if !inside_text => {
                if !inside_parens {
                    return Err(errors::Error::Syntax(
                        "Unmatched closing parenthesis.".to_owned(),
                    ));
                }
                inside_parens = false;
                groups.push(std::mem::take(&mut current));
            }
            _ if inside_parens => current.push(c),
            c if c.is_whitespace() || c == ',' => {}
            other => {
                return Err(errors::Error::Syntax(format!(
                    "Unexpected '{}' between value groups.",
                    other
                )))
            }
        }
    }
    if inside_parens {
        return Err(errors::Error::Syntax(
            "Missing closing parenthesis.".to_owned(),
        ));
    }
    Ok(groups)
}

/// Splits the contents of a group on commas outside quotes.
pub fn split_values(group: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut inside_text = false;
    for c in group.chars() {
        match c {
            '\'' => {
                inside_text = !inside_text;
                current.push(c);
            }
            ',' if !inside_text => values.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    values.push(current.trim().to_string());
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_keeps_groups_and_text() {
        let tokens = tokenize_sql("INSERT INTO a VALUES (1, 2) ('x y', 3)").unwrap();
        assert_eq!(
            tokens,
            vec!["INSERT", "INTO", "a", "VALUES", "(1, 2)", "('x y', 3)"]
        );
        let tokens = tokenize_sql("SELECT FROM a\n  WHERE KEY = 'big apple'").unwrap();
        assert_eq!(tokens.back().unwrap(), "'big apple'");
        assert_eq!(tokens.len(), 7);
    }

    #[test]
    fn test_tokenize_rejects_unbalanced_input() {
        assert_eq!(tokenize_sql("(1, 2").unwrap_err().code(), 4000);
        assert_eq!(tokenize_sql("1, 2)").unwrap_err().code(), 4000);
        assert_eq!(tokenize_sql("((1))").unwrap_err().code(), 4000);
        assert_eq!(tokenize_sql("'abc").unwrap_err().code(), 4000);
    }

    #[test]
    fn test_split_groups_and_values() {
        let groups = split_groups("(1, 10),(2, 20) ('a,b', 30)").unwrap();
        assert_eq!(groups, vec!["1, 10", "2, 20", "'a,b', 30"]);
        assert_eq!(split_values(&groups[2]), vec!["'a,b'", "30"]);
        assert!(split_groups("(1, 2) x").is_err());
    }
}

//! Splitting of `.cyphers` script text into individual statements for the
//! Bolt executor. `cypher-shell` does its own splitting, so this is only used
//! when scripts are sent through the driver.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// A Cypher statement, trimmed and without its terminating `;`.
    Cypher(String),
    /// A `cypher-shell` command such as `:begin` or `:param`. These are
    /// line-based and have no meaning over Bolt.
    ShellCommand(String),
}

/// Split script text on `;` outside string literals, backtick-quoted names
/// and comments. Comments are dropped and empty statements skipped.
pub fn split_statements(text: &str) -> Vec<Statement> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ':' if current.trim().is_empty() => {
                // A command ends at the end of its line or at the first `;`
                // outside quotes; anything after that `;` is parsed as Cypher.
                let mut command = String::from(':');
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                    match next {
                        ';' => break,
                        '\'' | '"' | '`' => {
                            command.push(next);
                            read_quoted(&mut chars, next, &mut command);
                        }
                        _ => command.push(next),
                    }
                }
                out.push(Statement::ShellCommand(command.trim_end().to_owned()));
                current.clear();
            }
            '\'' | '"' | '`' => {
                current.push(c);
                read_quoted(&mut chars, c, &mut current);
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                current.push(' ');
            }
            ';' => flush(&mut out, &mut current),
            _ => current.push(c),
        }
    }
    flush(&mut out, &mut current);
    out
}

fn flush(out: &mut Vec<Statement>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        out.push(Statement::Cypher(trimmed.to_owned()));
    }
    current.clear();
}

/// Copy a quoted section up to and including its closing quote. Strings honour
/// backslash escapes; backtick names escape a backtick by doubling it.
fn read_quoted(chars: &mut Peekable<Chars<'_>>, quote: char, buf: &mut String) {
    while let Some(c) = chars.next() {
        buf.push(c);
        if c == '\\' && quote != '`' {
            if let Some(escaped) = chars.next() {
                buf.push(escaped);
            }
            continue;
        }
        if c == quote {
            if quote == '`' && chars.peek() == Some(&'`') {
                buf.push('`');
                chars.next();
                continue;
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cypher(s: &str) -> Statement {
        Statement::Cypher(s.to_owned())
    }

    #[test]
    fn splits_on_semicolons() {
        let got = split_statements("CREATE (a:A);\nCREATE (b:B);\n");
        assert_eq!(got, vec![cypher("CREATE (a:A)"), cypher("CREATE (b:B)")]);
    }

    #[test]
    fn last_statement_needs_no_terminator() {
        let got = split_statements("RETURN 1;\nRETURN 2");
        assert_eq!(got, vec![cypher("RETURN 1"), cypher("RETURN 2")]);
    }

    #[test]
    fn semicolons_inside_literals_are_kept() {
        let got = split_statements(
            "RETURN split('a;b', ';') AS xs;\nRETURN \"x;\\\"y\" AS s;\nMATCH (n:`odd;label`) RETURN n;",
        );
        assert_eq!(
            got,
            vec![
                cypher("RETURN split('a;b', ';') AS xs"),
                cypher("RETURN \"x;\\\"y\" AS s"),
                cypher("MATCH (n:`odd;label`) RETURN n"),
            ]
        );
    }

    #[test]
    fn comments_are_dropped() {
        let got = split_statements(
            "// header; not a statement\nMATCH (n) /* inline; comment */ RETURN n;\n// trailing\n",
        );
        assert_eq!(got, vec![cypher("MATCH (n)   RETURN n")]);
    }

    #[test]
    fn url_in_string_is_not_a_comment() {
        let got = split_statements("LOAD CSV FROM 'file:///yelp.csv' AS row RETURN row;");
        assert_eq!(
            got,
            vec![cypher("LOAD CSV FROM 'file:///yelp.csv' AS row RETURN row")]
        );
    }

    #[test]
    fn shell_commands_are_separated() {
        let got = split_statements(":begin\nCREATE (n:N {k: 'v'});\n:commit;\n");
        assert_eq!(
            got,
            vec![
                Statement::ShellCommand(":begin".into()),
                cypher("CREATE (n:N {k: 'v'})"),
                Statement::ShellCommand(":commit".into()),
            ]
        );
    }

    #[test]
    fn statement_after_command_on_same_line_is_kept() {
        let got = split_statements(":param limit => 10; MATCH (n) RETURN n LIMIT $limit;\n");
        assert_eq!(
            got,
            vec![
                Statement::ShellCommand(":param limit => 10".into()),
                cypher("MATCH (n) RETURN n LIMIT $limit"),
            ]
        );
    }

    #[test]
    fn quoted_semicolon_stays_in_command() {
        let got = split_statements(":param sep => ';'\nRETURN $sep;");
        assert_eq!(
            got,
            vec![
                Statement::ShellCommand(":param sep => ';'".into()),
                cypher("RETURN $sep"),
            ]
        );
    }

    #[test]
    fn label_colon_is_not_a_command() {
        let got = split_statements("MATCH (n:Business) RETURN n;");
        assert_eq!(got, vec![cypher("MATCH (n:Business) RETURN n")]);
    }

    #[test]
    fn blank_input_yields_nothing() {
        assert!(split_statements("").is_empty());
        assert!(split_statements(" ;;\n // only a comment\n").is_empty());
    }
}

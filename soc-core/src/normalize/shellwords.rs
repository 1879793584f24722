/// Splits a command line honoring POSIX single/double quoting; falls back
/// to a plain whitespace split on malformed input (spec §4.2).
pub fn split(command_line: &str) -> Vec<String> {
    match try_split(command_line) {
        Some(args) => args,
        None => command_line.split_whitespace().map(str::to_string).collect(),
    }
}

fn try_split(input: &str) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut has_token = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_double => {
                in_single = !in_single;
                has_token = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                has_token = true;
            }
            '\\' if in_double || (!in_single && !in_double) => {
                if let Some(&next) = chars.peek() {
                    current.push(next);
                    chars.next();
                    has_token = true;
                }
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if in_single || in_double {
        return None;
    }
    if has_token {
        args.push(current);
    }
    Some(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_quoted_arguments() {
        let args = split(r#"cmd.exe /c "echo hello world""#);
        assert_eq!(args, vec!["cmd.exe", "/c", "echo hello world"]);
    }

    #[test]
    fn falls_back_to_whitespace_split_on_unterminated_quote() {
        let args = split(r#"cmd.exe "unterminated"#);
        assert_eq!(args, vec!["cmd.exe", "\"unterminated"]);
    }

    #[test]
    fn handles_single_quotes() {
        let args = split("cp 'a file.txt' dest");
        assert_eq!(args, vec!["cp", "a file.txt", "dest"]);
    }
}

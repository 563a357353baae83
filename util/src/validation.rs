//! Shape checks for instructor-authored strings that end up on a command line
//! or as a file inside the sandbox.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters allowed in command-line arguments and compiler/interpreter flags.
pub static COMMAND_LINE_ARG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\-_=.+]+$").expect("valid regex"));

/// Filenames must start with a letter; no path separators.
pub static FILENAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9\-_.]*$").expect("valid regex"));

pub fn is_legal_command_line_arg(arg: &str) -> bool {
    COMMAND_LINE_ARG_REGEX.is_match(arg)
}

pub fn is_legal_filename(name: &str) -> bool {
    FILENAME_REGEX.is_match(name)
}

/// Returns the first argument that fails [`is_legal_command_line_arg`].
pub fn first_illegal_arg<'a, I>(args: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    args.into_iter()
        .map(String::as_str)
        .find(|a| !is_legal_command_line_arg(a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_args() {
        assert!(is_legal_command_line_arg("-Wall"));
        assert!(is_legal_command_line_arg("--leak-check=full"));
        assert!(is_legal_command_line_arg("-std=c++17"));
        assert!(!is_legal_command_line_arg(""));
        assert!(!is_legal_command_line_arg("a;rm"));
        assert!(!is_legal_command_line_arg("$(whoami)"));
        assert!(!is_legal_command_line_arg("two words"));
    }

    #[test]
    fn filenames() {
        assert!(is_legal_filename("main.cpp"));
        assert!(is_legal_filename("test_1-a.py"));
        assert!(!is_legal_filename("1main.cpp"));
        assert!(!is_legal_filename("../etc/passwd"));
        assert!(!is_legal_filename(".hidden"));
    }

    #[test]
    fn first_illegal_arg_reports_offender() {
        let args = vec!["-O2".to_string(), "x|y".to_string(), "z&".to_string()];
        assert_eq!(first_illegal_arg(&args), Some("x|y"));
    }
}

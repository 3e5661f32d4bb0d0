//! Interactive confirmation prompts
//!
//! The generic `*_with` variants take explicit reader and writer handles so
//! they can be driven from tests; the plain functions use the terminal.

use crate::error::{RegistryError, Result};
use std::io::{self, BufRead, Write};

/// Ask a y/N question. Anything but `y`/`yes` is a no.
pub fn confirm(question: &str) -> Result<bool> {
    confirm_with(&mut io::stdin().lock(), &mut io::stdout(), question)
}

pub fn confirm_with<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<bool> {
    let answer = ask_with(input, output, &format!("{} (y/N): ", question))?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Ask the user to type `expected` back exactly.
pub fn confirm_typed(prompt: &str, expected: &str) -> Result<bool> {
    confirm_typed_with(&mut io::stdin().lock(), &mut io::stdout(), prompt, expected)
}

pub fn confirm_typed_with<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
    expected: &str,
) -> Result<bool> {
    let answer = ask_with(input, output, &format!("{}: ", prompt))?;
    Ok(answer == expected)
}

/// Read one line for a required value.
pub fn ask(label: &str) -> Result<String> {
    ask_with(&mut io::stdin().lock(), &mut io::stdout(), &format!("{}: ", label))
}

/// Read a secret without echoing it to the terminal.
pub fn ask_secret(label: &str) -> Result<String> {
    rpassword::prompt_password(format!("{}: ", label)).map_err(closed_input)
}

pub fn ask_secret_with<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> Result<String> {
    rpassword::prompt_password_from_bufread(input, output, format!("{}: ", label)).map_err(closed_input)
}

fn closed_input(e: io::Error) -> RegistryError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        RegistryError::Validation("No input available for an interactive prompt".to_string())
    } else {
        e.into()
    }
}

fn ask_with<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<String> {
    output.write_all(prompt.as_bytes())?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(RegistryError::Validation(
            "No input available for an interactive prompt".to_string(),
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_confirm_answers() {
        let mut out = Vec::new();
        for (answer, expected) in [("y\n", true), ("YES\n", true), ("n\n", false), ("\n", false)] {
            let mut input = Cursor::new(answer);
            assert_eq!(confirm_with(&mut input, &mut out, "Delete foo?").unwrap(), expected);
        }
        assert!(String::from_utf8(out).unwrap().contains("Delete foo? (y/N): "));
    }

    #[test]
    fn test_confirm_typed_is_exact() {
        let mut out = Vec::new();
        assert!(confirm_typed_with(&mut Cursor::new("alice\n"), &mut out, "Username", "alice").unwrap());
        assert!(!confirm_typed_with(&mut Cursor::new("Alice\n"), &mut out, "Username", "alice").unwrap());
    }

    #[test]
    fn test_ask_secret_reads_one_line() {
        let mut out = Vec::new();
        let secret = ask_secret_with(&mut Cursor::new("hunter2\nnext\n"), &mut out, "Password").unwrap();
        assert_eq!(secret, "hunter2");
        assert!(String::from_utf8(out).unwrap().contains("Password: "));
    }

    #[test]
    fn test_ask_secret_on_closed_input() {
        let mut out = Vec::new();
        let err = ask_secret_with(&mut Cursor::new(""), &mut out, "Password").unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[test]
    fn test_closed_input_is_an_error() {
        let mut out = Vec::new();
        assert!(confirm_with(&mut Cursor::new(""), &mut out, "Sure?").is_err());
    }
}

//! Line-based console interaction.

use std::io::{BufRead, Write};

use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};

use crate::{Error, Result};

/// Where prompts are shown and answers are read from.
pub trait Terminal {
    /// Show `prompt` and read one line. The answer is trimmed.
    fn ask(&mut self, prompt: &str) -> Result<String>;

    /// Print one line of user-facing output.
    fn say(&mut self, line: &str);

    /// Clear the screen before a menu. No-op by default.
    fn clear(&mut self) {}
}

/// Ask a yes/no question; only `y` (any case) counts as yes.
pub fn confirm<T: Terminal + ?Sized>(term: &mut T, prompt: &str) -> Result<bool> {
    Ok(term.ask(prompt)?.eq_ignore_ascii_case("y"))
}

/// [`Terminal`] over any reader/writer pair, e.g. locked stdin and stdout.
pub struct LineTerminal<R, W> {
    input: R,
    output: W,
    clear_screen: bool,
}

impl<R: BufRead, W: Write> LineTerminal<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            clear_screen: false,
        }
    }

    /// Enable clearing the screen before menus.
    pub fn with_clear_screen(mut self, clear_screen: bool) -> Self {
        self.clear_screen = clear_screen;
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Terminal for LineTerminal<R, W> {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        // raw bytes, so a non-UTF-8 answer is just an invalid choice
        let mut line = Vec::new();
        if self.input.read_until(b'\n', &mut line)? == 0 {
            return Err(Error::InputClosed);
        }
        Ok(String::from_utf8_lossy(&line).trim().to_string())
    }

    fn say(&mut self, line: &str) {
        let _ = writeln!(self.output, "{line}");
    }

    fn clear(&mut self) {
        if self.clear_screen {
            let _ = execute!(self.output, Clear(ClearType::All), MoveTo(0, 0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn terminal(input: &str) -> LineTerminal<Cursor<Vec<u8>>, Vec<u8>> {
        LineTerminal::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_ask_trims_and_echoes_prompt() {
        let mut term = terminal("  https://youtu.be/x \r\n");

        assert_eq!(term.ask("URL: ").unwrap(), "https://youtu.be/x");
        assert_eq!(String::from_utf8(term.into_output()).unwrap(), "URL: ");
    }

    #[test]
    fn test_ask_with_invalid_utf8_answer() {
        let mut term = LineTerminal::new(Cursor::new(b"\xff\xfe2\n3\n".to_vec()), Vec::new());

        assert_eq!(term.ask("? ").unwrap(), "\u{FFFD}\u{FFFD}2");
        assert_eq!(term.ask("? ").unwrap(), "3");
    }

    #[test]
    fn test_ask_on_closed_input() {
        let mut term = terminal("");
        assert!(matches!(term.ask("? "), Err(Error::InputClosed)));
    }

    #[test]
    fn test_confirm() {
        let mut term = terminal("Y\nn\nyes\n\n");
        assert!(confirm(&mut term, "? ").unwrap());
        assert!(!confirm(&mut term, "? ").unwrap());
        assert!(!confirm(&mut term, "? ").unwrap());
        assert!(!confirm(&mut term, "? ").unwrap());
    }

    #[test]
    fn test_clear_is_opt_in() {
        let mut term = terminal("");
        term.clear();
        assert!(term.into_output().is_empty());

        let mut term = terminal("").with_clear_screen(true);
        term.clear();
        assert!(!term.into_output().is_empty());
    }
}

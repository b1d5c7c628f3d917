use std::io::{BufRead, Write};

use crate::error::{SurveyError, SurveyResult};

/// Line-oriented prompts over any reader/writer pair.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, message: impl AsRef<str>) -> SurveyResult<()> {
        writeln!(self.output, "{}", message.as_ref())?;
        Ok(())
    }

    /// Prints the question and returns the trimmed answer.
    pub fn ask(&mut self, question: &str) -> SurveyResult<String> {
        writeln!(self.output, "{question}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(SurveyError::InputClosed);
        }
        Ok(line.trim().to_string())
    }

    /// Re-asks until the answer is `yes` or `no` (case-insensitive).
    pub fn ask_yes_no(&mut self, question: &str) -> SurveyResult<bool> {
        loop {
            match self.ask(question)?.to_lowercase().as_str() {
                "yes" => return Ok(true),
                "no" => return Ok(false),
                _ => self.say("Invalid input. Please enter 'yes' or 'no'.")?,
            }
        }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }
}

//! Operator input for step mode and interactive-validation blocks.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

/// Source of operator answers. `None` signals end of input.
pub trait Prompter: Send {
    fn ask(&mut self, message: &str) -> Option<String>;
}

/// Reads answers line by line from stdin.
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, message: &str) -> Option<String> {
        print!("{} ", message);
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(_) => None,
        }
    }
}

/// Scripted answers for tests and non-interactive runs.
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: Vec<&str>) -> Self {
        Self {
            answers: answers.into_iter().map(str::to_string).collect(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, _message: &str) -> Option<String> {
        self.answers.pop_front()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    SkipAll,
}

/// Yes/no question. Unrecognised input re-prompts; end of input means no.
pub fn ask_yes_no(prompter: &mut dyn Prompter, message: &str) -> Answer {
    loop {
        let Some(answer) = prompter.ask(&format!("{} [y/n]", message)) else {
            return Answer::No;
        };
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Answer::Yes,
            "n" | "no" => return Answer::No,
            _ => continue,
        }
    }
}

/// Step-mode question: adds `s` for "skip all remaining prompts".
pub fn ask_step(prompter: &mut dyn Prompter, message: &str) -> Answer {
    loop {
        let Some(answer) = prompter.ask(&format!("{} [y/n/s]", message)) else {
            return Answer::No;
        };
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Answer::Yes,
            "n" | "no" => return Answer::No,
            "s" | "skip" => return Answer::SkipAll,
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revalidates_on_typos() {
        let mut prompter = ScriptedPrompter::new(vec!["maybe", "", "YES"]);
        assert_eq!(ask_yes_no(&mut prompter, "continue?"), Answer::Yes);
    }

    #[test]
    fn test_eof_means_no() {
        let mut prompter = ScriptedPrompter::new(vec![]);
        assert_eq!(ask_yes_no(&mut prompter, "continue?"), Answer::No);
        let mut prompter = ScriptedPrompter::new(vec!["bogus"]);
        assert_eq!(ask_yes_no(&mut prompter, "continue?"), Answer::No);
    }

    #[test]
    fn test_step_skip_all() {
        let mut prompter = ScriptedPrompter::new(vec!["x", "s"]);
        assert_eq!(ask_step(&mut prompter, "next block?"), Answer::SkipAll);
    }
}

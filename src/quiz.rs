//! Question kinds returned by the quiz generator and their text rendering.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Question {
    MultipleChoice {
        question: String,
        options: Vec<String>,
        /// Index into `options`.
        answer: usize,
        #[serde(default)]
        explanation: Option<String>,
    },
    TrueFalse {
        question: String,
        answer: bool,
        #[serde(default)]
        explanation: Option<String>,
    },
    ShortAnswer {
        question: String,
        answer: String,
    },
}

impl Question {
    pub fn prompt(&self) -> &str {
        match self {
            Question::MultipleChoice { question, .. }
            | Question::TrueFalse { question, .. }
            | Question::ShortAnswer { question, .. } => question,
        }
    }

    /// The correct answer as displayed to the user. `None` when a
    /// multiple-choice answer index is out of range.
    pub fn answer_text(&self) -> Option<String> {
        match self {
            Question::MultipleChoice {
                options, answer, ..
            } => options
                .get(*answer)
                .map(|opt| format!("{}) {}", option_label(*answer), opt)),
            Question::TrueFalse { answer, .. } => {
                Some(if *answer { "True" } else { "False" }.to_string())
            }
            Question::ShortAnswer { answer, .. } => Some(answer.clone()),
        }
    }

    fn explanation(&self) -> Option<&str> {
        match self {
            Question::MultipleChoice { explanation, .. }
            | Question::TrueFalse { explanation, .. } => explanation.as_deref(),
            Question::ShortAnswer { .. } => None,
        }
    }

    /// Renders the question, numbered from 1.
    pub fn render(&self, number: usize, with_answer: bool) -> String {
        let mut out = format!("Q{}. {}\n", number, self.prompt());
        match self {
            Question::MultipleChoice { options, .. } => {
                for (i, opt) in options.iter().enumerate() {
                    let _ = writeln!(out, "   {}) {}", option_label(i), opt);
                }
            }
            Question::TrueFalse { .. } => out.push_str("   True / False\n"),
            Question::ShortAnswer { .. } => {}
        }
        if with_answer {
            let answer = self.answer_text().unwrap_or_else(|| "(invalid answer)".to_string());
            let _ = writeln!(out, "   Answer: {}", answer);
            if let Some(explanation) = self.explanation() {
                let _ = writeln!(out, "   {}", explanation);
            }
        }
        out
    }
}

/// Spreadsheet-style option label: A..Z, then AA, AB and so on.
fn option_label(index: usize) -> String {
    let mut n = index + 1;
    let mut label = Vec::new();
    while n > 0 {
        n -= 1;
        label.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}

/// Renders a whole quiz, separating questions by a blank line.
pub fn render_quiz(questions: &[Question], with_answers: bool) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| q.render(i + 1, with_answers))
        .collect::<Vec<_>>()
        .join("\n")
}

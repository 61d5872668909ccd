//! Line editing for the REPL.
//!
//! `rustyline` blocks while it owns the terminal, so the editor lives on its
//! own thread and hands finished lines back over a channel.

use anyhow::{Context, Result, anyhow};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::mpsc as std_mpsc;
use std::thread;
use tokio::sync::mpsc;

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// Ctrl-C at the prompt
    Interrupted,
    /// Ctrl-D, or the input thread is gone
    Eof,
}

type ReadResult = std::result::Result<Input, String>;

pub struct LineReader {
    prompts: std_mpsc::Sender<String>,
    lines: mpsc::Receiver<ReadResult>,
}

impl LineReader {
    pub fn spawn() -> Result<Self> {
        let (prompts, prompt_rx) = std_mpsc::channel::<String>();
        let (line_tx, lines) = mpsc::channel::<ReadResult>(1);

        thread::Builder::new()
            .name("nextspot-input".to_string())
            .spawn(move || {
                let mut editor = match DefaultEditor::new() {
                    Ok(editor) => editor,
                    Err(e) => {
                        let _ = line_tx.blocking_send(Err(e.to_string()));
                        return;
                    }
                };

                while let Ok(prompt) = prompt_rx.recv() {
                    let input = match editor.readline(&prompt) {
                        Ok(line) => {
                            if !line.trim().is_empty() {
                                let _ = editor.add_history_entry(line.as_str());
                            }
                            Ok(Input::Line(line))
                        }
                        Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
                        Err(ReadlineError::Eof) => Ok(Input::Eof),
                        Err(e) => Err(e.to_string()),
                    };
                    if line_tx.blocking_send(input).is_err() {
                        break;
                    }
                }
            })
            .context("Failed to start input thread")?;

        Ok(Self { prompts, lines })
    }

    pub async fn read_line(&mut self, prompt: &str) -> Result<Input> {
        // A stopped thread still surfaces its last result through `lines`
        let _ = self.prompts.send(prompt.to_string());

        match self.lines.recv().await {
            Some(Ok(input)) => Ok(input),
            Some(Err(message)) => Err(anyhow!("Failed to read input: {message}")),
            None => Ok(Input::Eof),
        }
    }
}

//! Console input shared by the REPL and the human-in-the-loop tool.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

use crate::domain::traits::HumanChannel;

type LineReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// One line reader over stdin. Cloning shares the reader, so the REPL and the
/// human channel never read concurrently.
#[derive(Clone)]
pub struct ConsoleInput {
    reader: Arc<Mutex<LineReader>>,
}

impl ConsoleInput {
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }

    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        Self {
            reader: Arc::new(Mutex::new(Box::new(reader))),
        }
    }

    /// Prints `prompt` and reads one line. `None` means end of input.
    pub async fn read_line(&self, prompt: &str) -> Result<Option<String>> {
        if !prompt.is_empty() {
            let mut stdout = std::io::stdout();
            write!(stdout, "{prompt}").context("Failed to write prompt")?;
            stdout.flush().context("Failed to flush stdout")?;
        }
        let mut reader = self.reader.lock().await;
        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .context("Failed to read from console")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Asks the user on the console.
pub struct ConsoleHuman {
    input: ConsoleInput,
}

impl ConsoleHuman {
    pub fn new(input: ConsoleInput) -> Self {
        Self { input }
    }
}

#[async_trait]
impl HumanChannel for ConsoleHuman {
    async fn ask(&self, question: &str) -> Result<String> {
        println!("\n🤖 {question}");
        let Some(answer) = self.input.read_line("👤 ").await? else {
            bail!("Input closed before an answer was given");
        };
        let answer = answer.trim();
        if answer.is_empty() {
            bail!("No answer was entered");
        }
        tracing::info!(question, answer, "Human answered");
        Ok(answer.to_string())
    }
}

//! Scripted collaborators shared by the unit tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::domain::traits::{
    Database, HumanChannel, LlmProvider, MediaPlayer, SearchProvider, ToolCallingProvider,
    VoiceOutput,
};
use crate::domain::types::{SearchHit, SpotifyAction, ToolCallResponse, ToolSpec};
use crate::infrastructure::tools::ToolSet;

/// Returns the scripted replies in order, then errors.
#[derive(Default)]
pub struct MockLlm {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_error(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn completion(&self, prompt: &str, _agent: &str) -> Result<String, String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("no scripted response".to_string()))
    }
}

#[derive(Default)]
pub struct MockToolCaller {
    responses: Mutex<VecDeque<ToolCallResponse>>,
    requests: Mutex<Vec<(String, usize)>>,
}

impl MockToolCaller {
    pub fn new(responses: Vec<ToolCallResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `(user message, number of tools offered)` per request.
    pub fn requests(&self) -> Vec<(String, usize)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolCallingProvider for MockToolCaller {
    async fn chat_with_tools(
        &self,
        _agent: &str,
        _system: &str,
        user: &str,
        tools: &[ToolSpec],
    ) -> Result<ToolCallResponse, String> {
        self.requests
            .lock()
            .unwrap()
            .push((user.to_string(), tools.len()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| "no scripted response".to_string())
    }
}

pub struct MockDatabase {
    answer: Result<Value, String>,
    queries: Mutex<Vec<String>>,
}

impl MockDatabase {
    pub fn with_rows(rows: Value) -> Self {
        Self {
            answer: Ok(rows),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn query(&self, sql: &str) -> Result<Value> {
        self.queries.lock().unwrap().push(sql.to_string());
        self.answer.clone().map_err(|e| anyhow!(e))
    }

    async fn describe_schema(&self) -> Result<String> {
        match &self.answer {
            Ok(_) => Ok("products: id INTEGER, name TEXT, price REAL".to_string()),
            Err(e) => Err(anyhow!(e.clone())),
        }
    }
}

#[derive(Default)]
pub struct MockSearch {
    hits: Vec<SearchHit>,
    requests: Mutex<Vec<(String, u8)>>,
}

impl MockSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(String, u8)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(&self, query: &str, num_results: u8) -> Result<Vec<SearchHit>> {
        self.requests
            .lock()
            .unwrap()
            .push((query.to_string(), num_results));
        Ok(self.hits.clone())
    }
}

#[derive(Default)]
pub struct MockHuman {
    answers: Mutex<VecDeque<String>>,
    questions: Mutex<Vec<String>>,
}

impl MockHuman {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait]
impl HumanChannel for MockHuman {
    async fn ask(&self, question: &str) -> Result<String> {
        self.questions.lock().unwrap().push(question.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no answer"))
    }
}

#[derive(Default)]
pub struct MockMedia {
    actions: Mutex<Vec<String>>,
}

impl MockMedia {
    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaPlayer for MockMedia {
    async fn perform(&self, action: &SpotifyAction) -> Result<Value> {
        self.actions.lock().unwrap().push(action.name().to_string());
        Ok(json!({ "status": "ok", "action": action.name() }))
    }
}

#[derive(Default)]
pub struct MockVoice {
    spoken: Mutex<Vec<String>>,
}

impl MockVoice {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoiceOutput for MockVoice {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Builder for a `ToolSet` of mocks; unspecified collaborators are empty mocks.
pub struct ToolSetBuilder {
    set: ToolSet,
}

pub fn tool_set() -> ToolSetBuilder {
    ToolSetBuilder {
        set: ToolSet {
            database: Arc::new(MockDatabase::with_rows(json!([]))),
            search: Arc::new(MockSearch::default()),
            human: Arc::new(MockHuman::default()),
            media: Arc::new(MockMedia::default()),
        },
    }
}

impl ToolSetBuilder {
    pub fn database(mut self, database: Arc<dyn Database>) -> Self {
        self.set.database = database;
        self
    }

    pub fn search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.set.search = search;
        self
    }

    pub fn human(mut self, human: Arc<dyn HumanChannel>) -> Self {
        self.set.human = human;
        self
    }

    pub fn media(mut self, media: Arc<dyn MediaPlayer>) -> Self {
        self.set.media = media;
        self
    }

    pub fn build(self) -> ToolSet {
        self.set
    }
}

use std::{
    collections::VecDeque,
    sync::Mutex,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use plotgpt::llm::{ChatMessage, ChatOptions, CompletionService};

/// Replays canned replies in order, then repeats `fallback`. Records every request.
pub struct ScriptedService {
    replies: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedService {
    pub fn new<I, T>(replies: I, fallback: &str) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            fallback: fallback.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self::new(Vec::<String>::new(), reply)
    }

    pub fn fail_next(self, message: &str) -> Self {
        self.replies.lock().unwrap().push_front(Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn complete(&self, messages: &[ChatMessage], _opts: &ChatOptions) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(self.fallback.clone()),
        }
    }
}

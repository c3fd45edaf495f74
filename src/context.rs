use crate::model::Message;
use std::collections::VecDeque;

/// Sliding window over the most recent user/assistant exchanges.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    messages: VecDeque<Message>,
    max_exchanges: usize,
}

impl ConversationContext {
    pub fn new(max_exchanges: usize) -> Self {
        Self { messages: VecDeque::with_capacity(max_exchanges * 2), max_exchanges }
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    /// Adds one exchange, dropping the oldest ones beyond the window.
    pub fn append(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.messages.push_back(Message::user(user));
        self.messages.push_back(Message::assistant(assistant));
        while self.messages.len() > self.max_exchanges * 2 {
            self.messages.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

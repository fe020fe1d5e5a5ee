#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A file handed to the remote side, referenced by its remote id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub attachments: Vec<FileRef>,
}

impl Message {
    pub fn user(content: impl Into<String>, attachments: Vec<FileRef>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachments,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachments: Vec::new(),
        }
    }
}

/// Remote conversation context. The id is assigned once by the remote side;
/// the message log only grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationThread {
    id: String,
    messages: Vec<Message>,
}

impl ConversationThread {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_log_is_append_only() {
        let mut thread = ConversationThread::new("thread_1");
        thread.append(Message::user("hi", Vec::new()));
        thread.append(Message::assistant("hello"));

        assert_eq!(thread.id(), "thread_1");
        assert_eq!(thread.len(), 2);
        assert_eq!(thread.messages()[0].role, Role::User);
        assert_eq!(thread.messages()[1].content, "hello");
    }
}

use crate::config::{MultiImagePolicy, ReactSettings};
use crate::converters::content::{apply_image_policy, flatten_content};
use crate::converters::helpers::trim_message;
use crate::converters::openai::OpenAIMessage;
use crate::converters::role::Role;
use crate::engine::{ConversationTurn, Query};
use crate::errors::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactPrompt {
    pub query: Query,
    pub history: Vec<ConversationTurn>,
    pub images: Vec<Vec<u8>>,
}

/// Rewrites a conversation that carries tool results into ReAct form:
/// function results become `Observation:` lines on the assistant turn that
/// requested them and a custom system prompt is folded into the newest question.
pub fn reformat_react(
    messages: &[OpenAIMessage],
    settings: &ReactSettings,
    policy: MultiImagePolicy,
) -> Result<ReactPrompt, ProtocolError> {
    if !messages
        .iter()
        .any(|m| Role::parse(&m.role) == Some(Role::User))
    {
        return Err(ProtocolError::NoUserMessage);
    }

    let mut images = Vec::new();
    let mut messages = messages;
    let mut system = String::new();
    if let Some((first, rest)) = messages.split_first() {
        if Role::parse(&first.role) == Some(Role::System) {
            system = trim_message(&flatten_content(&first.content, &mut images)?);
            if system == settings.default_system_prompt {
                system.clear();
            }
            messages = rest;
        }
    }

    let mut entries: Vec<(Role, String)> = Vec::new();
    for (i, message) in messages.iter().enumerate() {
        let text = trim_message(&flatten_content(&message.content, &mut images)?);
        match Role::parse(&message.role) {
            Some(Role::Function) => match entries.last_mut() {
                Some((Role::Assistant, content)) => {
                    content.push_str("\nObservation: ");
                    content.push_str(&text);
                    if i == messages.len() - 1 {
                        content.push_str("\nThought:");
                    }
                }
                _ => return Err(ProtocolError::FunctionWithoutAssistant),
            },
            Some(Role::Assistant) => match entries.last_mut() {
                None => return Err(ProtocolError::AssistantBeforeUser),
                Some((Role::User, _)) => entries.push((Role::Assistant, text)),
                Some((_, content)) => content.push_str(&text),
            },
            Some(Role::User) => entries.push((Role::User, text)),
            _ => return Err(ProtocolError::UnrecognizedRole(message.role.clone())),
        }
    }

    let mut query = match entries.last() {
        Some((Role::User, _)) => entries
            .pop()
            .map(|(_, text)| Query::Text(text))
            .unwrap_or(Query::Continuation),
        _ => Query::Continuation,
    };

    if entries.len() % 2 != 0 {
        return Err(ProtocolError::UnpairedTurn);
    }

    let pair_count = entries.len() / 2;
    let mut history = Vec::with_capacity(pair_count);
    let mut pairs = entries.into_iter();
    while let (Some(user), Some(assistant)) = (pairs.next(), pairs.next()) {
        let ((Role::User, question), (Role::Assistant, answer)) = (user, assistant) else {
            return Err(ProtocolError::UnpairedTurn);
        };
        let mut question = trim_message(&question);
        if !system.is_empty() && history.len() == pair_count - 1 {
            question = format!("{}\n\nQuestion: {}", system, question);
            system.clear();
        }
        let answer = strip_dummy_thought(&trim_message(&answer), &settings.dummy_thoughts);
        history.push(ConversationTurn::new(question, answer));
    }

    if !system.is_empty() {
        query = match query {
            Query::Text(text) => Query::Text(format!("{}\n\nQuestion: {}", system, text)),
            Query::Continuation => return Err(ProtocolError::UnpairedTurn),
        };
    }

    Ok(ReactPrompt {
        query,
        history,
        images: apply_image_policy(images, policy)?,
    })
}

/// Drops the canned "final answer" thought from the start of an assistant turn
/// that actually goes on to call a tool.
pub fn strip_dummy_thought(answer: &str, phrases: &[String]) -> String {
    let mut answer = answer;
    for phrase in phrases {
        let phrase = phrase.trim_start_matches('\n');
        if answer.contains("\nAction: ") {
            if let Some(rest) = answer.strip_prefix(phrase) {
                answer = rest;
            }
        }
    }
    answer.to_string()
}

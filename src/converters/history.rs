use crate::config::MultiImagePolicy;
use crate::converters::content::{apply_image_policy, flatten_content};
use crate::converters::openai::OpenAIMessage;
use crate::converters::role::Role;
use crate::engine::ConversationTurn;
use crate::errors::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedHistory {
    pub query: String,
    pub history: Vec<ConversationTurn>,
    pub images: Vec<Vec<u8>>,
}

/// Folds an alternating user/assistant message list into answered turns plus
/// the trailing user query. An empty assistant message leaves its turn open.
pub fn normalize_history(
    messages: &[OpenAIMessage],
    policy: MultiImagePolicy,
) -> Result<NormalizedHistory, ProtocolError> {
    let mut history: Vec<(String, String)> = Vec::new();
    let mut images = Vec::new();
    let mut query = None;

    for (i, message) in messages.iter().enumerate() {
        let text = flatten_content(&message.content, &mut images)?;
        match Role::parse(&message.role) {
            Some(Role::User) if i == messages.len() - 1 => query = Some(text),
            Some(Role::User) => history.push((text, String::new())),
            Some(Role::Assistant) => {
                let Some((question, answer)) = history.last_mut() else {
                    return Err(ProtocolError::AssistantBeforeUser);
                };
                if !answer.is_empty() {
                    return Err(ProtocolError::DoubleAnswer {
                        question: question.clone(),
                    });
                }
                *answer = text;
            }
            _ => return Err(ProtocolError::UnrecognizedRole(message.role.clone())),
        }
    }

    let query = query.ok_or(ProtocolError::LastMessageFromAssistant)?;
    let history = history
        .into_iter()
        .map(|(question, answer)| {
            if answer.is_empty() {
                Err(ProtocolError::UnpairedTurn)
            } else {
                Ok(ConversationTurn::new(question, answer))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NormalizedHistory {
        query,
        history,
        images: apply_image_policy(images, policy)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::openai::{OpenAIContent, OpenAIContentItem, OpenAIImageUrl};

    fn msg(role: &str, content: &str) -> OpenAIMessage {
        OpenAIMessage::new(role, content)
    }

    #[test]
    fn test_alternating_messages_become_answered_turns() {
        for k in 0..4 {
            let mut messages = Vec::new();
            for i in 0..k {
                messages.push(msg("user", &format!("Q{}", i)));
                messages.push(msg("assistant", &format!("A{}", i)));
            }
            messages.push(msg("user", "final"));

            let normalized = normalize_history(&messages, MultiImagePolicy::LastOnly).unwrap();
            assert_eq!(normalized.query, "final");
            assert_eq!(normalized.history.len(), k);
            for (i, turn) in normalized.history.iter().enumerate() {
                assert_eq!(turn, &ConversationTurn::new(format!("Q{}", i), format!("A{}", i)));
            }
            assert!(normalized.images.is_empty());
        }
    }

    #[test]
    fn test_text_and_image_parts() {
        let messages = vec![OpenAIMessage::new(
            "user",
            OpenAIContent::Array(vec![
                OpenAIContentItem::Text {
                    text: "describe".to_string(),
                },
                OpenAIContentItem::ImageUrl {
                    image_url: OpenAIImageUrl {
                        url: "data:image/png;base64,AAAA".to_string(),
                        detail: None,
                    },
                },
            ]),
        )];

        let normalized = normalize_history(&messages, MultiImagePolicy::LastOnly).unwrap();
        assert_eq!(normalized.query, "describe");
        assert!(normalized.history.is_empty());
        assert_eq!(normalized.images, vec![vec![0u8, 0, 0]]);
    }

    #[test]
    fn test_images_from_history_follow_policy() {
        let with_image = |text: &str, payload: &str| {
            OpenAIMessage::new(
                "user",
                OpenAIContent::Array(vec![
                    OpenAIContentItem::Text {
                        text: text.to_string(),
                    },
                    OpenAIContentItem::ImageUrl {
                        image_url: OpenAIImageUrl {
                            url: format!("data:image/png;base64,{}", payload),
                            detail: None,
                        },
                    },
                ]),
            )
        };
        let messages = vec![
            with_image("first", "AAAA"),
            msg("assistant", "ok"),
            with_image("second", "/w=="),
        ];

        let last = normalize_history(&messages, MultiImagePolicy::LastOnly).unwrap();
        assert_eq!(last.images, vec![vec![0xffu8]]);

        let all = normalize_history(&messages, MultiImagePolicy::All).unwrap();
        assert_eq!(all.images, vec![vec![0u8, 0, 0], vec![0xff]]);

        assert_eq!(
            normalize_history(&messages, MultiImagePolicy::RejectMulti),
            Err(ProtocolError::TooManyImages(2))
        );
    }

    #[test]
    fn test_double_answer() {
        let messages = vec![
            msg("user", "Q1"),
            msg("assistant", "A1"),
            msg("assistant", "A2"),
            msg("user", "Q2"),
        ];
        assert_eq!(
            normalize_history(&messages, MultiImagePolicy::LastOnly),
            Err(ProtocolError::DoubleAnswer {
                question: "Q1".to_string()
            })
        );
    }

    #[test]
    fn test_assistant_first() {
        let messages = vec![msg("assistant", "hi"), msg("user", "Q")];
        assert_eq!(
            normalize_history(&messages, MultiImagePolicy::LastOnly),
            Err(ProtocolError::AssistantBeforeUser)
        );
    }

    #[test]
    fn test_unrecognized_role() {
        let messages = vec![msg("system", "be brief"), msg("user", "Q")];
        assert_eq!(
            normalize_history(&messages, MultiImagePolicy::LastOnly),
            Err(ProtocolError::UnrecognizedRole("system".to_string()))
        );
    }

    #[test]
    fn test_consecutive_user_messages_are_unpaired() {
        let messages = vec![msg("user", "Q1"), msg("user", "Q2")];
        assert_eq!(
            normalize_history(&messages, MultiImagePolicy::LastOnly),
            Err(ProtocolError::UnpairedTurn)
        );
    }

    #[test]
    fn test_empty_answer_does_not_answer_turn() {
        let messages = vec![msg("user", "Q1"), msg("assistant", ""), msg("user", "Q2")];
        assert_eq!(
            normalize_history(&messages, MultiImagePolicy::LastOnly),
            Err(ProtocolError::UnpairedTurn)
        );
    }

    #[test]
    fn test_answer_after_empty_answer_fills_turn() {
        let messages = vec![
            msg("user", "Q1"),
            msg("assistant", ""),
            msg("assistant", "A1"),
            msg("user", "Q2"),
        ];
        let normalized = normalize_history(&messages, MultiImagePolicy::LastOnly).unwrap();
        assert_eq!(normalized.query, "Q2");
        assert_eq!(normalized.history, vec![ConversationTurn::new("Q1", "A1")]);
    }
}

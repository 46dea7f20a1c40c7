use crate::config::SamplingDefaults;
use crate::converters::content::content_text;
use crate::converters::openai::{OpenAIMessage, OpenAIRequest};
use crate::converters::role::Role;
use crate::engine::SamplingParams;
use crate::errors::ProtocolError;

/// Wire-level checks run before anything else touches the request.
pub fn validate_request(request: &OpenAIRequest) -> Result<(), ProtocolError> {
    let Some(last) = request.messages.last() else {
        return Err(ProtocolError::EmptyMessages);
    };

    if Role::parse(&last.role) == Some(Role::Assistant) {
        check_turn_order(&request.messages)?;
        return Err(ProtocolError::LastMessageFromAssistant);
    }

    validate_sampling(request)
}

/// Walks user/assistant messages in order. An assistant message needs an open
/// turn, and a turn holding a non-empty answer cannot be answered again.
fn check_turn_order(messages: &[OpenAIMessage]) -> Result<(), ProtocolError> {
    let mut turn: Option<(String, String)> = None;
    for message in messages {
        match Role::parse(&message.role) {
            Some(Role::User) => turn = Some((content_text(&message.content), String::new())),
            Some(Role::Assistant) => {
                let Some((question, answer)) = turn.as_mut() else {
                    return Err(ProtocolError::AssistantBeforeUser);
                };
                if !answer.is_empty() {
                    return Err(ProtocolError::DoubleAnswer {
                        question: question.clone(),
                    });
                }
                *answer = content_text(&message.content);
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_sampling(request: &OpenAIRequest) -> Result<(), ProtocolError> {
    if let Some(temperature) = request.temperature {
        if temperature.is_nan() || temperature < 0.0 {
            return Err(invalid("temperature", "must be >= 0"));
        }
    }
    if let Some(top_p) = request.top_p {
        if top_p.is_nan() || top_p <= 0.0 || top_p > 1.0 {
            return Err(invalid("top_p", "must be in (0, 1]"));
        }
    }
    if request.max_tokens == Some(0) {
        return Err(invalid("max_tokens", "must be > 0"));
    }
    if let Some(penalty) = request.repetition_penalty {
        if penalty.is_nan() || penalty <= 0.0 {
            return Err(invalid("repetition_penalty", "must be > 0"));
        }
    }
    Ok(())
}

fn invalid(name: &'static str, reason: &str) -> ProtocolError {
    ProtocolError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}

/// Request values win over configured defaults.
pub fn resolve_sampling(request: &OpenAIRequest, defaults: &SamplingDefaults) -> SamplingParams {
    SamplingParams {
        temperature: request.temperature.unwrap_or(defaults.temperature),
        top_p: request.top_p.unwrap_or(defaults.top_p),
        max_tokens: request.max_tokens.unwrap_or(defaults.max_tokens),
        repetition_penalty: request
            .repetition_penalty
            .unwrap_or(defaults.repetition_penalty),
        stop: request
            .stop
            .clone()
            .map(|s| s.into_vec())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: serde_json::Value) -> OpenAIRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_empty_messages() {
        let req = request(json!({"model": "m", "messages": []}));
        assert_eq!(validate_request(&req), Err(ProtocolError::EmptyMessages));
    }

    #[test]
    fn test_sole_assistant_is_assistant_before_user() {
        let req = request(json!({"model": "m", "messages": [{"role": "assistant", "content": "hi"}]}));
        assert_eq!(validate_request(&req), Err(ProtocolError::AssistantBeforeUser));

        let req = request(json!({"model": "m", "messages": [
            {"role": "assistant", "content": "hi"},
            {"role": "user", "content": "Q"},
            {"role": "assistant", "content": "A"}
        ]}));
        assert_eq!(validate_request(&req), Err(ProtocolError::AssistantBeforeUser));
    }

    #[test]
    fn test_last_message_from_assistant() {
        let req = request(json!({"model": "m", "messages": [
            {"role": "user", "content": "Q1"},
            {"role": "assistant", "content": "A1"}
        ]}));
        assert_eq!(validate_request(&req), Err(ProtocolError::LastMessageFromAssistant));
    }

    #[test]
    fn test_double_answer_takes_precedence_over_trailing_assistant() {
        let req = request(json!({"model": "m", "messages": [
            {"role": "user", "content": "Q1"},
            {"role": "assistant", "content": "A1"},
            {"role": "assistant", "content": "A2"}
        ]}));
        assert_eq!(
            validate_request(&req),
            Err(ProtocolError::DoubleAnswer {
                question: "Q1".to_string()
            })
        );

        // an empty answer leaves the turn open
        let req = request(json!({"model": "m", "messages": [
            {"role": "user", "content": "Q1"},
            {"role": "assistant", "content": ""},
            {"role": "assistant", "content": "A1"}
        ]}));
        assert_eq!(validate_request(&req), Err(ProtocolError::LastMessageFromAssistant));
    }

    #[test]
    fn test_validation_is_deterministic() {
        let accepted = request(json!({"model": "m", "messages": [{"role": "user", "content": "Q"}]}));
        let rejected = request(json!({"model": "m", "messages": [{"role": "assistant", "content": "A"}]}));
        for _ in 0..3 {
            assert_eq!(validate_request(&accepted), Ok(()));
            assert_eq!(validate_request(&rejected), Err(ProtocolError::AssistantBeforeUser));
        }
    }

    #[test]
    fn test_sampling_parameters_are_checked() {
        let cases = [
            (json!({"temperature": -0.1}), "temperature"),
            (json!({"top_p": 0.0}), "top_p"),
            (json!({"top_p": 1.5}), "top_p"),
            (json!({"max_tokens": 0}), "max_tokens"),
            (json!({"repetition_penalty": 0.0}), "repetition_penalty"),
        ];
        for (params, expected) in cases {
            let mut body = json!({"model": "m", "messages": [{"role": "user", "content": "Q"}]});
            for (k, v) in params.as_object().unwrap() {
                body[k] = v.clone();
            }
            match validate_request(&request(body)) {
                Err(ProtocolError::InvalidParameter { name, .. }) => assert_eq!(name, expected),
                other => panic!("expected invalid {}, got {:?}", expected, other),
            }
        }

        let ok = request(json!({
            "model": "m",
            "messages": [{"role": "user", "content": "Q"}],
            "temperature": 0.0,
            "top_p": 1.0,
            "max_tokens": 1,
            "repetition_penalty": 1.2
        }));
        assert_eq!(validate_request(&ok), Ok(()));
    }

    #[test]
    fn test_resolve_sampling_defaults_and_overrides() {
        let defaults = SamplingDefaults::default();

        let req = request(json!({"model": "m", "messages": [{"role": "user", "content": "Q"}]}));
        let params = resolve_sampling(&req, &defaults);
        assert_eq!(params.temperature, 0.8);
        assert_eq!(params.top_p, 0.8);
        assert_eq!(params.max_tokens, 1024);
        assert_eq!(params.repetition_penalty, 1.0);
        assert!(params.stop.is_empty());

        let req = request(json!({
            "model": "m",
            "messages": [{"role": "user", "content": "Q"}],
            "temperature": 0.2,
            "max_tokens": 64,
            "stop": ["\nObservation:"]
        }));
        let params = resolve_sampling(&req, &defaults);
        assert_eq!(params.temperature, 0.2);
        assert_eq!(params.top_p, 0.8);
        assert_eq!(params.max_tokens, 64);
        assert_eq!(params.stop, vec!["\nObservation:".to_string()]);
    }
}

mod openai_choice;
mod openai_content;
mod openai_content_item;
mod openai_image_url;
mod openai_message;
mod openai_request;
mod openai_response;
mod openai_response_message;
mod openai_stop;
mod openai_stream_choice;
mod openai_stream_chunk;
mod openai_stream_delta;
mod openai_usage;

pub use openai_choice::OpenAIChoice;
pub use openai_content::OpenAIContent;
pub use openai_content_item::OpenAIContentItem;
pub use openai_image_url::OpenAIImageUrl;
pub use openai_message::OpenAIMessage;
pub use openai_request::OpenAIRequest;
pub use openai_response::OpenAIResponse;
pub use openai_response_message::OpenAIResponseMessage;
pub use openai_stop::OpenAIStop;
pub use openai_stream_choice::OpenAIStreamChoice;
pub use openai_stream_chunk::OpenAIStreamChunk;
pub use openai_stream_delta::OpenAIStreamDelta;
pub use openai_usage::OpenAIUsage;

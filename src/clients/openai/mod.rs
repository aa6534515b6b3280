pub mod chat_completions;
pub mod types;

pub use chat_completions::OpenAiClient;

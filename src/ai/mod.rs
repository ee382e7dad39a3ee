mod chat;
mod local;
mod prompt;
mod provider;
mod scheduler;

pub use chat::ChatCompletionProvider;
pub use local::LocalProvider;
pub use prompt::PromptTemplate;
pub use provider::AnalysisProvider;
pub use scheduler::AnalysisScheduler;

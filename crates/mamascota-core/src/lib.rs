//! Mamascota core library.
//! Pet profiles, the static clinical knowledge base, clinical context assembly and the chat
//! agent turn that feeds the assembled context to a completion service.

pub mod agent;
pub mod breeds;
pub mod completion;
pub mod config;
pub mod context;
pub mod knowledge;
pub mod lang;
pub mod pet;
pub mod prompts;
pub mod symptoms;

pub use agent::{
    AgentError, AgentResponse, ChatAgent, ChatRequest, GENERIC_FAILURE, NO_PET_DATA,
    SUMMARY_PREFIX,
};
pub use completion::{
    ChatMessage, CompletionError, CompletionService, EchoCompletion, OpenAiChatClient, Role,
};
pub use config::GatewayConfig;
pub use context::{
    AssembledContext, AssemblyFailure, AssemblyRequest, ContextAssembler, ContextError,
    ContextPayload,
};
pub use knowledge::{FileSource, KnowledgeBase, KnowledgeBaseStore, KnowledgeSource, StaticSource};
pub use pet::{PetProfile, Sex, Species};
pub use prompts::PromptProfile;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

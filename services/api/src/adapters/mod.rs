pub mod db;
pub mod generation_llm;

pub use db::DbAdapter;
pub use generation_llm::OpenAiGenerationAdapter;

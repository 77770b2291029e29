pub mod db;
pub mod oracle_llm;

pub use db::DbAdapter;
pub use oracle_llm::OpenAiOracleAdapter;

pub mod schema;

#[allow(unused_imports)]
pub use schema::{
    AgentConfig, Config, DocumentsConfig, EmbeddingConfig, GatewayConfig, SessionsConfig,
};

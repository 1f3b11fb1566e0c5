pub mod assembler;
pub mod attribution;
pub mod audit;
pub mod config;
pub mod error;
pub mod extract;
pub mod generator;
pub mod llm;
pub mod models;
pub mod sections;
pub mod server;
pub mod store;

pub use config::AppConfig;
pub use error::PipelineError;
pub use generator::IcfGenerator;
pub use server::run_server;

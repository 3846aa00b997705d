//! OpenRouter chat-completions generator

mod client;
pub mod types;

pub use client::{
    extract_html, GeneratorSettings, OpenRouterGenerator, DEFAULT_BASE_URL, DEFAULT_MODEL,
};

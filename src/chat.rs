//! Chat-template rendering seam.
//!
//! The pipeline core treats the template engine as an external collaborator:
//! it hands over the message list plus the bos/eos token strings and gets a
//! rendered prompt back. [`ChatTemplateRenderer`] is that boundary;
//! [`JinjaRenderer`] is the default implementation over minijinja, matching
//! the Jinja-style templates that model repositories ship.

use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One message of a structured conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ChatTemplateError {
    #[error("template failed to compile: {0}")]
    Compile(minijinja::Error),
    #[error("template failed to render: {0}")]
    Render(minijinja::Error),
}

/// Boundary between the tokenizer façade and the template engine.
pub trait ChatTemplateRenderer: Send + Sync {
    fn render(
        &self,
        messages: &[ChatMessage],
        add_generation_prompt: bool,
        bos_token: &str,
        eos_token: &str,
    ) -> Result<String, ChatTemplateError>;
}

/// Jinja-style renderer backed by minijinja.
pub struct JinjaRenderer {
    env: Environment<'static>,
}

impl JinjaRenderer {
    pub fn new(source: &str) -> Result<Self, ChatTemplateError> {
        let mut env = Environment::new();
        env.add_template_owned("chat".to_string(), source.to_string())
            .map_err(ChatTemplateError::Compile)?;
        Ok(Self { env })
    }
}

impl ChatTemplateRenderer for JinjaRenderer {
    fn render(
        &self,
        messages: &[ChatMessage],
        add_generation_prompt: bool,
        bos_token: &str,
        eos_token: &str,
    ) -> Result<String, ChatTemplateError> {
        let template = self
            .env
            .get_template("chat")
            .map_err(ChatTemplateError::Render)?;
        template
            .render(context! {
                messages => messages,
                add_generation_prompt => add_generation_prompt,
                bos_token => bos_token,
                eos_token => eos_token,
            })
            .map_err(ChatTemplateError::Render)
    }
}

// tex.rs - TeX Exporter Module
// Watches messages for ```tex code blocks and replies with the rendered
// formula as a PNG image fetched from the configured render service.
//
// Used by: handler.rs (module list)

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serenity::{
    client::Context,
    model::{
        application::interaction::application_command::{ApplicationCommandInteraction, CommandDataOption},
        channel::{AttachmentType, Message},
    },
};

use super::{reply, BotModule, SUB_COMMAND_HELP, SUB_COMMAND_INFO};
use crate::error::{BotError, BotResult};

static TEX_CODEBLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```tex\n(.+?)\n```").expect("Invalid tex code block regex pattern")
});

/// Resolution prefix understood by the render service.
const RENDER_DPI: &str = r"\dpi{200}";
const IMAGE_FILENAME: &str = "tex.png";

pub struct TexExporter {
    render_endpoint: String,
    timeout: Duration,
}

impl TexExporter {
    pub fn new(render_endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            render_endpoint: render_endpoint.into(),
            timeout,
        }
    }

    fn render_url(&self, tex: &str) -> String {
        let query = format!("{}{}", RENDER_DPI, tex);
        format!("{}?{}", self.render_endpoint, urlencoding::encode(&query))
    }

    async fn render_tex_to_image(&self, tex: &str) -> BotResult<Vec<u8>> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let response = client.get(self.render_url(tex)).send().await?;

        if !response.status().is_success() {
            return Err(BotError::RenderStatus(response.status()));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Every ```tex block in a message, in order of appearance.
pub fn extract_tex_blocks(content: &str) -> Vec<&str> {
    TEX_CODEBLOCK_REGEX
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .map(|block| block.as_str())
        .collect()
}

#[async_trait]
impl BotModule for TexExporter {
    fn name(&self) -> &'static str {
        "TexExporter"
    }

    fn description(&self) -> &'static str {
        "Renders messages written in TeX to images"
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn author(&self) -> &'static str {
        "sor4chi"
    }

    fn base_commands(&self) -> &'static [&'static str] {
        &["tex-exporter"]
    }

    fn sub_commands(&self) -> &'static [(&'static str, &'static str)] {
        &[
            (SUB_COMMAND_HELP, "Show help for TexExporter"),
            (SUB_COMMAND_INFO, "Show information about TexExporter"),
        ]
    }

    async fn handle_command(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
        _sub_command: &str,
        _options: &[CommandDataOption],
        _trace_id: &str,
    ) -> BotResult {
        reply(ctx, command, "Unknown subcommand.", true).await?;
        Ok(())
    }

    async fn handle_message(&self, ctx: &Context, msg: &Message) -> BotResult {
        if msg.author.bot {
            return Ok(());
        }

        let blocks = extract_tex_blocks(&msg.content);
        if blocks.is_empty() {
            return Ok(());
        }
        debug!("[TEX] {} block(s) in message {}", blocks.len(), msg.id);

        // Typing indicator keeps refreshing until stopped
        let typing = msg.channel_id.start_typing(&ctx.http)?;

        for tex in blocks {
            match self.render_tex_to_image(tex).await {
                Ok(image) => {
                    msg.channel_id
                        .send_message(&ctx.http, |message| {
                            message.add_file(AttachmentType::Bytes {
                                data: Cow::Owned(image),
                                filename: IMAGE_FILENAME.to_string(),
                            })
                        })
                        .await?;
                }
                Err(e) => {
                    warn!("[TEX] Rendering failed for message {}: {}", msg.id, e);
                    msg.channel_id
                        .say(&ctx.http, format!("Rendering failed\n```\n{}\n```", e))
                        .await?;
                }
            }
        }

        typing.stop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_single_block() {
        let content = "look:\n```tex\n\\frac{1}{2}\n```\nthanks";
        assert_eq!(extract_tex_blocks(content), vec!["\\frac{1}{2}"]);
    }

    #[test]
    fn test_extract_multiline_and_multiple_blocks() {
        let content = "```tex\na + b\n= c\n```\ntext\n```tex\nx^2\n```";
        assert_eq!(extract_tex_blocks(content), vec!["a + b\n= c", "x^2"]);
    }

    #[test]
    fn test_extract_ignores_other_languages() {
        assert!(extract_tex_blocks("```rust\nfn main() {}\n```").is_empty());
        assert!(extract_tex_blocks("no code here").is_empty());
    }

    #[test]
    fn test_render_url_encodes_query() {
        let exporter = TexExporter::new("https://render.example/png", Duration::from_secs(5));
        assert_eq!(
            exporter.render_url("a+b"),
            "https://render.example/png?%5Cdpi%7B200%7Da%2Bb"
        );
    }
}

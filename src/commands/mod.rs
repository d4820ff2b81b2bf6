// commands/mod.rs - Bot Module Registry
// Declares every bot module and the BotModule interface the loader in
// handler.rs dispatches through, plus helpers shared by the modules for
// reading slash command options and answering interactions.

pub mod inspector;      // Member roster inspector (/members)
pub mod picker;         // Random member picker (/pick)
pub mod tex;            // TeX code block renderer (/tex-exporter)
pub mod times;          // times-* channel provisioning (/times)
pub mod vc_notifier;    // Voice channel join/leave/move notifications (/vc-notifier, /vcn)

use async_trait::async_trait;
use serenity::{
    builder::CreateApplicationCommands,
    client::Context,
    model::{
        application::{
            command::CommandOptionType,
            interaction::{
                application_command::{
                    ApplicationCommandInteraction, CommandDataOption, CommandDataOptionValue,
                },
                modal::ModalSubmitInteraction,
                InteractionResponseType,
            },
        },
        channel::Message,
        voice::VoiceState,
    },
};

use crate::error::BotResult;

pub const SUB_COMMAND_HELP: &str = "help";
pub const SUB_COMMAND_INFO: &str = "info";

/// Discord rejects message content longer than this.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

// ============================================================================
// MODULE INTERFACE
// ============================================================================

/// A self-contained feature of the bot. Every module owns one or more base
/// slash commands, each carrying the subcommands listed by `sub_commands`.
/// `help` and `info` subcommands are answered by the loader.
#[async_trait]
pub trait BotModule: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn version(&self) -> &'static str;
    fn author(&self) -> &'static str;

    fn base_commands(&self) -> &'static [&'static str];

    /// `(subcommand, description)` pairs, in registration order.
    fn sub_commands(&self) -> &'static [(&'static str, &'static str)];

    fn info(&self) -> String {
        format!(
            "Name: {}\nDescription: {}\nVersion: {}\nAuthor: {}",
            self.name(),
            self.description(),
            self.version(),
            self.author()
        )
    }

    fn help(&self) -> String {
        let base = self
            .base_commands()
            .iter()
            .map(|command| format!("/{}", command))
            .collect::<Vec<_>>()
            .join(", ");
        let subs = self
            .sub_commands()
            .iter()
            .map(|(sub, description)| format!("{}: {}", sub, description))
            .collect::<Vec<_>>()
            .join("\n");
        format!("Base Commands: [ {} ]\nSub Commands:\n{}", base, subs)
    }

    fn owns_command(&self, name: &str) -> bool {
        self.base_commands().contains(&name)
    }

    /// Register this module's commands. The default creates one command per
    /// base name with an option-less subcommand for every `sub_commands` entry.
    fn register_commands(&self, commands: &mut CreateApplicationCommands) {
        for base in self.base_commands() {
            commands.create_application_command(|command| {
                command.name(*base).description(self.description());
                for (sub, description) in self.sub_commands() {
                    command.create_option(|option| {
                        option
                            .name(*sub)
                            .description(*description)
                            .kind(CommandOptionType::SubCommand)
                    });
                }
                command
            });
        }
    }

    /// Handle a subcommand other than `help`/`info`.
    async fn handle_command(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
        sub_command: &str,
        options: &[CommandDataOption],
        trace_id: &str,
    ) -> BotResult;

    /// Returns `Ok(true)` when the modal belonged to this module.
    async fn handle_modal(&self, _ctx: &Context, _modal: &ModalSubmitInteraction) -> BotResult<bool> {
        Ok(false)
    }

    async fn handle_voice_state(&self, _ctx: &Context, _old: Option<&VoiceState>, _new: &VoiceState) -> BotResult {
        Ok(())
    }

    async fn handle_message(&self, _ctx: &Context, _msg: &Message) -> BotResult {
        Ok(())
    }
}

// ============================================================================
// OPTION HELPERS
// ============================================================================

/// The invoked subcommand and its options, if the command has one.
pub fn sub_command(command: &ApplicationCommandInteraction) -> Option<(&str, &[CommandDataOption])> {
    command
        .data
        .options
        .iter()
        .find(|option| option.kind == CommandOptionType::SubCommand)
        .map(|option| (option.name.as_str(), option.options.as_slice()))
}

pub fn find_option<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a CommandDataOptionValue> {
    options
        .iter()
        .find(|option| option.name == name)
        .and_then(|option| option.resolved.as_ref())
}

pub fn integer_option(options: &[CommandDataOption], name: &str) -> Option<i64> {
    match find_option(options, name) {
        Some(CommandDataOptionValue::Integer(value)) => Some(*value),
        _ => None,
    }
}

pub fn boolean_option(options: &[CommandDataOption], name: &str) -> Option<bool> {
    match find_option(options, name) {
        Some(CommandDataOptionValue::Boolean(value)) => Some(*value),
        _ => None,
    }
}

// ============================================================================
// RESPONSE HELPERS
// ============================================================================

pub async fn reply(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    content: impl ToString,
    ephemeral: bool,
) -> serenity::Result<()> {
    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content(content).ephemeral(ephemeral))
        })
        .await
}

/// Split content into chunks of at most `max_len` bytes along line breaks.
/// A single line longer than `max_len` is hard-split on char boundaries.
/// Joining the chunks of line-split content with `\n` gives the content back,
/// so a blank line at a chunk boundary comes out as an empty chunk.
pub fn split_message(content: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk: Option<String> = None;

    for line in content.lines() {
        if let Some(chunk) = current_chunk.as_mut() {
            if chunk.len() + 1 + line.len() <= max_len {
                chunk.push('\n');
                chunk.push_str(line);
                continue;
            }
        }

        chunks.extend(current_chunk.take());

        let mut rest = line;
        while rest.len() > max_len {
            let mut cut = max_len;
            while cut > 0 && !rest.is_char_boundary(cut) {
                cut -= 1;
            }
            // max_len is narrower than the first char
            if cut == 0 {
                cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
            }
            chunks.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        if !rest.is_empty() || line.is_empty() {
            current_chunk = Some(rest.to_string());
        }
    }

    chunks.extend(current_chunk);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[async_trait]
    impl BotModule for Dummy {
        fn name(&self) -> &'static str {
            "Dummy"
        }
        fn description(&self) -> &'static str {
            "Does nothing"
        }
        fn version(&self) -> &'static str {
            "0.1.0"
        }
        fn author(&self) -> &'static str {
            "someone"
        }
        fn base_commands(&self) -> &'static [&'static str] {
            &["dummy", "dm"]
        }
        fn sub_commands(&self) -> &'static [(&'static str, &'static str)] {
            &[("help", "Show help"), ("info", "Show info")]
        }
        async fn handle_command(
            &self,
            _ctx: &Context,
            _command: &ApplicationCommandInteraction,
            _sub_command: &str,
            _options: &[CommandDataOption],
            _trace_id: &str,
        ) -> BotResult {
            Ok(())
        }
    }

    #[test]
    fn test_info_text() {
        assert_eq!(
            Dummy.info(),
            "Name: Dummy\nDescription: Does nothing\nVersion: 0.1.0\nAuthor: someone"
        );
    }

    #[test]
    fn test_help_lists_base_and_sub_commands() {
        assert_eq!(
            Dummy.help(),
            "Base Commands: [ /dummy, /dm ]\nSub Commands:\nhelp: Show help\ninfo: Show info"
        );
    }

    #[test]
    fn test_owns_command() {
        assert!(Dummy.owns_command("dm"));
        assert!(!Dummy.owns_command("pick"));
    }

    #[test]
    fn test_split_message_short_content() {
        let chunks = split_message("one line", 100);
        assert_eq!(chunks, vec!["one line"]);
    }

    #[test]
    fn test_split_message_breaks_on_lines() {
        let content = "aaaa\nbbbb\ncccc";
        let chunks = split_message(content, 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc"]);
        for chunk in &chunks {
            assert!(chunk.len() <= 9);
        }
    }

    #[test]
    fn test_split_message_hard_splits_long_line() {
        let content = "あいうえお";
        let chunks = split_message(content, 7);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 7));
        assert_eq!(chunks.concat(), content);
    }

    #[test]
    fn test_split_message_keeps_blank_line_at_boundary() {
        let chunks = split_message("a\n\nb", 1);
        assert_eq!(chunks, vec!["a", "", "b"]);
        assert_eq!(chunks.join("\n"), "a\n\nb");
        assert_eq!(split_message("a\n\nb", 10), vec!["a\n\nb"]);
    }

    #[test]
    fn test_split_message_limit_narrower_than_char() {
        let chunks = split_message("あい", 1);
        assert_eq!(chunks, vec!["あ", "い"]);
        assert_eq!(split_message("ab", 0), vec!["a", "b"]);
        assert_eq!(split_message("aaaa", 2), vec!["aa", "aa"]);
    }

    #[test]
    fn test_split_message_empty_content() {
        assert!(split_message("", 100).is_empty());
    }
}

// times.rs - Times Manager Module
// Implements /times create: asks for a channel name through a modal, then
// creates times-<name> inside the category that matches the member's grade
// role (or the alumni role).
//
// Used by: handler.rs (module list)

use async_trait::async_trait;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serenity::{
    client::Context,
    model::{
        application::{
            component::{ActionRowComponent, InputTextStyle},
            interaction::{
                application_command::{ApplicationCommandInteraction, CommandDataOption},
                modal::ModalSubmitInteraction,
                InteractionResponseType,
            },
        },
        channel::ChannelType,
    },
};

use super::{reply, BotModule, SUB_COMMAND_HELP, SUB_COMMAND_INFO};
use crate::error::BotResult;

const BASE_COMMAND: &str = "times";
const SUB_COMMAND_CREATE: &str = "create";

const MODAL_ID: &str = "times-channel-create";
const NAME_INPUT_ID: &str = "times-channel-name";
const CHANNEL_PREFIX: &str = "times-";
/// Discord's limit on channel names, in characters.
const CHANNEL_NAME_LIMIT: usize = 100;
const NAME_MIN_LENGTH: u64 = 2;
// The input must leave room for the prefix
const NAME_MAX_LENGTH: u64 = (CHANNEL_NAME_LIMIT - CHANNEL_PREFIX.len()) as u64;

static GRADE_ROLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{2}B$").expect("Invalid grade role regex pattern"));

pub struct TimesManager {
    alumnus_role: String,
}

impl TimesManager {
    pub fn new(alumnus_role: impl Into<String>) -> Self {
        Self {
            alumnus_role: alumnus_role.into(),
        }
    }

    /// The role whose category the new channel goes into. Sorting descending
    /// puts the alumni role (non-ASCII) before grade roles, and the newest
    /// grade role before older ones.
    pub fn category_role<'a>(&self, role_names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
        role_names
            .into_iter()
            .filter(|name| *name == self.alumnus_role || GRADE_ROLE_PATTERN.is_match(name))
            .max()
    }

    async fn show_modal(&self, ctx: &Context, command: &ApplicationCommandInteraction) -> BotResult {
        command
            .create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::Modal)
                    .interaction_response_data(|modal| {
                        modal
                            .custom_id(MODAL_ID)
                            .title("Create a times channel")
                            .components(|components| {
                                components.create_action_row(|row| {
                                    row.create_input_text(|input| {
                                        input
                                            .custom_id(NAME_INPUT_ID)
                                            .label("Channel name (e.g. maximum creates times-maximum)")
                                            .placeholder("Enter the part after `times-`")
                                            .style(InputTextStyle::Short)
                                            .min_length(NAME_MIN_LENGTH)
                                            .max_length(NAME_MAX_LENGTH)
                                            .required(true)
                                    })
                                })
                            })
                    })
            })
            .await?;
        Ok(())
    }

    async fn create_channel(&self, ctx: &Context, modal: &ModalSubmitInteraction, name: &str) -> BotResult {
        let channel_name = format!("{}{}", CHANNEL_PREFIX, name);

        modal
            .create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|message| {
                        message.content(format!("Creating channel `{}`", channel_name))
                    })
            })
            .await?;

        let (guild_id, member) = match (modal.guild_id, modal.member.as_ref()) {
            (Some(guild_id), Some(member)) => (guild_id, member),
            _ => {
                edit_modal_reply(ctx, modal, "Member not found.").await?;
                return Ok(());
            }
        };

        let roles = guild_id.roles(&ctx.http).await?;
        let member_roles = member
            .roles
            .iter()
            .filter_map(|role_id| roles.get(role_id))
            .map(|role| role.name.as_str());
        let role = match self.category_role(member_roles) {
            Some(role) => role,
            None => {
                edit_modal_reply(ctx, modal, "No grade role found.").await?;
                return Ok(());
            }
        };

        let category_name = format!("{}{}", CHANNEL_PREFIX, role);
        let category = guild_id
            .channels(&ctx.http)
            .await?
            .into_values()
            .find(|channel| channel.kind == ChannelType::Category && channel.name == category_name);
        let category = match category {
            Some(category) => category,
            None => {
                let content = format!(
                    "Category \"{}\" was not found. It has to be created first.",
                    category_name
                );
                edit_modal_reply(ctx, modal, content).await?;
                return Ok(());
            }
        };

        let channel = guild_id
            .create_channel(&ctx.http, |create| {
                create
                    .name(&channel_name)
                    .kind(ChannelType::Text)
                    .category(category.id)
            })
            .await?;
        info!("[TIMES] Created {} ({}) for {}", channel.name, channel.id, modal.user.id);

        edit_modal_reply(ctx, modal, format!("Created channel: <#{}>", channel.id)).await?;
        channel.id.say(&ctx.http, welcome_message(modal.user.id.0)).await?;
        Ok(())
    }
}

async fn edit_modal_reply(ctx: &Context, modal: &ModalSubmitInteraction, content: impl ToString) -> BotResult {
    modal
        .edit_original_interaction_response(&ctx.http, |response| response.content(content))
        .await?;
    Ok(())
}

fn welcome_message(user_id: u64) -> String {
    format!(
        "**Created a times channel for <@{}>!**\n\n\
A times channel works like your own timeline: share what you are up to, ask everyone questions, or just chat casually.\n\
Use it however you like!\n\n\
If the channel was created by mistake, please let the server staff know.",
        user_id
    )
}

/// Value of the channel name field in a submitted modal.
fn submitted_name(modal: &ModalSubmitInteraction) -> Option<String> {
    modal
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            ActionRowComponent::InputText(input) if input.custom_id == NAME_INPUT_ID => {
                Some(input.value.trim().to_string())
            }
            _ => None,
        })
}

#[async_trait]
impl BotModule for TimesManager {
    fn name(&self) -> &'static str {
        "Times Manager"
    }

    fn description(&self) -> &'static str {
        "Manages Maximum's times channels"
    }

    fn version(&self) -> &'static str {
        "0.0.2"
    }

    fn author(&self) -> &'static str {
        "sor4chi"
    }

    fn base_commands(&self) -> &'static [&'static str] {
        &[BASE_COMMAND]
    }

    fn sub_commands(&self) -> &'static [(&'static str, &'static str)] {
        &[
            (SUB_COMMAND_CREATE, "Create a times channel"),
            (SUB_COMMAND_HELP, "Show help for Times Manager"),
            (SUB_COMMAND_INFO, "Show information about Times Manager"),
        ]
    }

    async fn handle_command(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
        sub_command: &str,
        _options: &[CommandDataOption],
        _trace_id: &str,
    ) -> BotResult {
        match sub_command {
            SUB_COMMAND_CREATE => self.show_modal(ctx, command).await,
            _ => {
                reply(ctx, command, "Unknown subcommand.", true).await?;
                Ok(())
            }
        }
    }

    async fn handle_modal(&self, ctx: &Context, modal: &ModalSubmitInteraction) -> BotResult<bool> {
        if modal.data.custom_id != MODAL_ID {
            return Ok(false);
        }

        match submitted_name(modal) {
            Some(name) if !name.is_empty() => self.create_channel(ctx, modal, &name).await?,
            _ => {
                modal
                    .create_interaction_response(&ctx.http, |response| {
                        response
                            .kind(InteractionResponseType::ChannelMessageWithSource)
                            .interaction_response_data(|message| {
                                message.content("A channel name is required.").ephemeral(true)
                            })
                    })
                    .await?;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_role_prefers_alumni() {
        let manager = TimesManager::new("卒業生");
        let role = manager.category_role(["21B", "卒業生", "member"]);
        assert_eq!(role, Some("卒業生"));
    }

    #[test]
    fn test_category_role_picks_newest_grade() {
        let manager = TimesManager::new("卒業生");
        assert_eq!(manager.category_role(["21B", "23B", "22B"]), Some("23B"));
    }

    #[test]
    fn test_category_role_ignores_other_roles() {
        let manager = TimesManager::new("alumni");
        assert_eq!(manager.category_role(["21M", "123B", "admin", "21b"]), None);
        assert_eq!(manager.category_role(Vec::<&str>::new()), None);
    }

    #[test]
    fn test_longest_input_fits_channel_name_limit() {
        let longest = "x".repeat(NAME_MAX_LENGTH as usize);
        let channel_name = format!("{}{}", CHANNEL_PREFIX, longest);
        assert_eq!(channel_name.chars().count(), CHANNEL_NAME_LIMIT);
        assert_eq!(NAME_MAX_LENGTH, 94);
    }

    #[test]
    fn test_welcome_message_mentions_user() {
        assert!(welcome_message(42).starts_with("**Created a times channel for <@42>!**"));
    }
}

// picker.rs - Members Picker Module
// Implements /pick members: draws random server members out of the mentioned
// users and roles, minus the excluded ones.
//
// Key Features:
// - Up to three target and three exclude mentions (users or roles)
// - Role expansion, including @everyone
// - Optional inclusion of bot accounts
//
// Used by: handler.rs (module list)

use async_trait::async_trait;
use log::{debug, info};
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
                InteractionResponseType,
            },
        },
        guild::Member,
        id::{GuildId, RoleId},
    },
};

use super::{boolean_option, find_option, integer_option, reply, BotModule, SUB_COMMAND_HELP, SUB_COMMAND_INFO};
use crate::error::{BotError, BotResult};
use crate::selection::{self, Candidate, IdentityRef, SelectionError};

const BASE_COMMAND: &str = "pick";
const SUB_COMMAND_MEMBERS: &str = "members";

const TARGET_PREFIX: &str = "target";
const EXCLUDE_PREFIX: &str = "exclude";
const OPTION_COUNT: usize = 3;
const COUNT_OPTION: &str = "count";
const BOT_OPTION: &str = "bot";

/// Discord's page size limit for the list-guild-members endpoint.
const MEMBER_PAGE_SIZE: u64 = 1000;

pub struct MembersPicker;

/// A mention as it arrives from the command options, before roles are expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mention {
    User(Candidate),
    Role(RoleId),
}

#[async_trait]
impl BotModule for MembersPicker {
    fn name(&self) -> &'static str {
        "Members Picker"
    }

    fn description(&self) -> &'static str {
        "Randomly picks server members under the given conditions"
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn author(&self) -> &'static str {
        "yukikamome316"
    }

    fn base_commands(&self) -> &'static [&'static str] {
        &[BASE_COMMAND]
    }

    fn sub_commands(&self) -> &'static [(&'static str, &'static str)] {
        &[
            (SUB_COMMAND_MEMBERS, "Run the member picker"),
            (SUB_COMMAND_HELP, "Show help for Members Picker"),
            (SUB_COMMAND_INFO, "Show information about Members Picker"),
        ]
    }

    fn register_commands(&self, commands: &mut CreateApplicationCommands) {
        commands.create_application_command(|command| {
            command
                .name(BASE_COMMAND)
                .description("Member picking commands")
                .create_option(|sub| {
                    sub.name(SUB_COMMAND_MEMBERS)
                        .description("Run the member picker")
                        .kind(CommandOptionType::SubCommand);
                    for i in 1..=OPTION_COUNT {
                        sub.create_sub_option(|option| {
                            option
                                .name(format!("{}{}", TARGET_PREFIX, i))
                                .description("Users or roles (@everyone too) to pick from")
                                .kind(CommandOptionType::Mentionable)
                                .required(i == 1)
                        });
                    }
                    sub.create_sub_option(|option| {
                        option
                            .name(COUNT_OPTION)
                            .description("How many members to pick (default 1)")
                            .kind(CommandOptionType::Integer)
                    });
                    for i in 1..=OPTION_COUNT {
                        sub.create_sub_option(|option| {
                            option
                                .name(format!("{}{}", EXCLUDE_PREFIX, i))
                                .description("Users or roles to leave out")
                                .kind(CommandOptionType::Mentionable)
                        });
                    }
                    sub.create_sub_option(|option| {
                        option
                            .name(BOT_OPTION)
                            .description("Include bot accounts (default false)")
                            .kind(CommandOptionType::Boolean)
                    })
                })
                .create_option(|sub| {
                    sub.name(SUB_COMMAND_HELP)
                        .description("Show help for Members Picker")
                        .kind(CommandOptionType::SubCommand)
                })
                .create_option(|sub| {
                    sub.name(SUB_COMMAND_INFO)
                        .description("Show information about Members Picker")
                        .kind(CommandOptionType::SubCommand)
                })
        });
    }

    async fn handle_command(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
        sub_command: &str,
        options: &[CommandDataOption],
        trace_id: &str,
    ) -> BotResult {
        match sub_command {
            SUB_COMMAND_MEMBERS => handle_members(ctx, command, options, trace_id).await,
            _ => {
                reply(ctx, command, "Unknown subcommand.", true).await?;
                Ok(())
            }
        }
    }
}

async fn handle_members(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    options: &[CommandDataOption],
    trace_id: &str,
) -> BotResult {
    let guild_id = match command.guild_id {
        Some(guild_id) => guild_id,
        None => {
            reply(ctx, command, "This command can only be used inside a server.", false).await?;
            return Ok(());
        }
    };

    let targets = mention_options(options, TARGET_PREFIX)?;
    let excludes = mention_options(options, EXCLUDE_PREFIX)?;
    let count = pick_count(integer_option(options, COUNT_OPTION));
    let include_bots = boolean_option(options, BOT_OPTION).unwrap_or(false);

    // Listing a large guild can outlast the 3s interaction deadline
    command
        .create_interaction_response(&ctx.http, |response| {
            response.kind(InteractionResponseType::DeferredChannelMessageWithSource)
        })
        .await?;

    let needs_roster = targets
        .iter()
        .chain(&excludes)
        .any(|mention| matches!(mention, Mention::Role(_)));
    let roster = if needs_roster {
        fetch_all_members(ctx, guild_id).await?
    } else {
        Vec::new()
    };
    debug!(
        "[PICK {}] {} targets, {} excludes, roster of {} members",
        trace_id,
        targets.len(),
        excludes.len(),
        roster.len()
    );

    let target_refs = expand_mentions(&targets, &roster, guild_id);
    let exclude_refs = expand_mentions(&excludes, &roster, guild_id);
    let self_id = ctx.cache.current_user_id();

    for reference in target_refs.iter().chain(&exclude_refs) {
        if let IdentityRef::Group { id, members } = reference {
            debug!("[PICK {}] Role {} expanded to {} members", trace_id, id, members.len());
        }
    }

    let eligible = selection::resolve(&target_refs, &exclude_refs, self_id, include_bots);
    let result = selection::select(eligible, count, &mut rand::thread_rng());
    let picked = match result {
        Ok(picked) => picked,
        Err(SelectionError::InsufficientCandidates { requested, available }) => {
            info!(
                "[PICK {}] Not enough candidates: requested {}, available {}",
                trace_id, requested, available
            );
            // The deferred reply is public, so swap it for an ephemeral follow-up
            command.delete_original_interaction_response(&ctx.http).await?;
            command
                .create_followup_message(&ctx.http, |message| {
                    message
                        .content(format!(
                            "Could not pick: only {} members match the given conditions, fewer than the {} requested.",
                            available, requested
                        ))
                        .ephemeral(true)
                })
                .await?;
            return Ok(());
        }
    };

    info!("[PICK {}] Picked {} of requested {}", trace_id, picked.len(), count);
    command
        .edit_original_interaction_response(&ctx.http, |response| {
            response.content(format_result(&picked))
        })
        .await?;
    Ok(())
}

/// Absent or non-positive counts fall back to one pick.
fn pick_count(raw: Option<i64>) -> usize {
    match raw {
        Some(value) if value > 0 => usize::try_from(value).unwrap_or(usize::MAX),
        _ => 1,
    }
}

fn mention_options(options: &[CommandDataOption], prefix: &str) -> BotResult<Vec<Mention>> {
    let mut mentions = Vec::new();
    for i in 1..=OPTION_COUNT {
        let name = format!("{}{}", prefix, i);
        match find_option(options, &name) {
            None => {}
            Some(CommandDataOptionValue::User(user, _)) => {
                mentions.push(Mention::User(Candidate::new(user.id, user.bot)));
            }
            Some(CommandDataOptionValue::Role(role)) => mentions.push(Mention::Role(role.id)),
            Some(_) => return Err(BotError::InvalidReference(name)),
        }
    }
    Ok(mentions)
}

/// List every member of the guild, one page at a time.
async fn fetch_all_members(ctx: &Context, guild_id: GuildId) -> BotResult<Vec<Member>> {
    let mut members = Vec::new();
    let mut after = None;

    loop {
        let page = guild_id
            .members(&ctx.http, Some(MEMBER_PAGE_SIZE), after)
            .await?;
        let page_len = page.len();
        after = page.last().map(|member| member.user.id);
        members.extend(page);

        if (page_len as u64) < MEMBER_PAGE_SIZE {
            break;
        }
    }

    Ok(members)
}

/// Turn mentions into identity references. The @everyone role shares the
/// guild's id and contains every member.
fn expand_mentions(mentions: &[Mention], roster: &[Member], guild_id: GuildId) -> Vec<IdentityRef> {
    mentions
        .iter()
        .map(|mention| match mention {
            Mention::User(candidate) => IdentityRef::Candidate(*candidate),
            Mention::Role(role_id) => {
                let everyone = role_id.0 == guild_id.0;
                let members = roster
                    .iter()
                    .filter(|member| everyone || member.roles.contains(role_id))
                    .map(|member| Candidate::new(member.user.id, member.user.bot))
                    .collect();
                IdentityRef::Group { id: *role_id, members }
            }
        })
        .collect()
}

fn format_result(picked: &[Candidate]) -> String {
    let mentions = picked
        .iter()
        .map(|candidate| format!("<@{}>", candidate.id))
        .collect::<Vec<_>>()
        .join(" ");
    format!("Picked: {}", mentions)
}

// inspector.rs - Members Inspector Module
// Implements /members show: fetches the club roster from the members API and
// renders active and inactive members ordered by grade.
//
// Used by: handler.rs (module list)

use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use serenity::{
    client::Context,
    model::application::interaction::{
        application_command::{ApplicationCommandInteraction, CommandDataOption},
        InteractionResponseType,
    },
};

use super::{reply, split_message, BotModule, MAX_MESSAGE_LENGTH, SUB_COMMAND_HELP, SUB_COMMAND_INFO};
use crate::error::BotResult;
use crate::grade::{parse_members, sort_members, Member, RawMember};

const BASE_COMMAND: &str = "members";
const SUB_COMMAND_SHOW: &str = "show";

pub struct MembersInspector {
    endpoint: String,
    timeout: Duration,
}

impl MembersInspector {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    async fn fetch_members(&self) -> BotResult<Vec<Member>> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let body = client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let raw: Vec<RawMember> = serde_json::from_str(&body)?;
        Ok(parse_members(raw)?)
    }
}

#[async_trait]
impl BotModule for MembersInspector {
    fn name(&self) -> &'static str {
        "Maximum Members Inspector"
    }

    fn description(&self) -> &'static str {
        "Shows the registration status of Maximum members"
    }

    fn version(&self) -> &'static str {
        "0.0.1"
    }

    fn author(&self) -> &'static str {
        "sor4chi"
    }

    fn base_commands(&self) -> &'static [&'static str] {
        &[BASE_COMMAND]
    }

    fn sub_commands(&self) -> &'static [(&'static str, &'static str)] {
        &[
            (SUB_COMMAND_SHOW, "Show the registration status of members"),
            (SUB_COMMAND_HELP, "Show help for Maximum Members Inspector"),
            (SUB_COMMAND_INFO, "Show information about Maximum Members Inspector"),
        ]
    }

    fn help(&self) -> String {
        let base = format!("Base Commands: [ /{} ]", BASE_COMMAND);
        let subs = self
            .sub_commands()
            .iter()
            .map(|(sub, description)| format!("{}: {}", sub, description))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "{}\nSub Commands:\n{}\n\n:closed: :approved: show each member's registration status.\n:closed: marks an inactive member.\n:approved: marks an active member.",
            base, subs
        )
    }

    async fn handle_command(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
        sub_command: &str,
        _options: &[CommandDataOption],
        trace_id: &str,
    ) -> BotResult {
        if sub_command != SUB_COMMAND_SHOW {
            reply(ctx, command, "Unknown subcommand.", true).await?;
            return Ok(());
        }

        // The roster endpoint can be slower than the 3s interaction deadline
        command
            .create_interaction_response(&ctx.http, |response| {
                response.kind(InteractionResponseType::DeferredChannelMessageWithSource)
            })
            .await?;

        let members = match self.fetch_members().await {
            Ok(members) => members,
            Err(e) => {
                warn!("[MEMBERS {}] Failed to load roster from {}: {}", trace_id, self.endpoint, e);
                command
                    .edit_original_interaction_response(&ctx.http, |response| {
                        response.content(format!("Failed to load the member list: {}", e))
                    })
                    .await?;
                return Ok(());
            }
        };
        info!("[MEMBERS {}] Loaded {} members", trace_id, members.len());

        let rendered = render_members(members);
        let mut chunks = split_message(&rendered, MAX_MESSAGE_LENGTH)
            .into_iter()
            .filter(|chunk| !chunk.trim().is_empty());

        if let Some(first) = chunks.next() {
            command
                .edit_original_interaction_response(&ctx.http, |response| response.content(first))
                .await?;
        }
        for chunk in chunks {
            command
                .create_followup_message(&ctx.http, |message| message.content(chunk))
                .await?;
        }

        Ok(())
    }
}

/// Render the roster, active members first, each section sorted by grade.
pub fn render_members(members: Vec<Member>) -> String {
    let (active, inactive): (Vec<Member>, Vec<Member>) =
        members.into_iter().partition(|member| member.is_active);

    let mut blocks = vec![
        "## Maximum Members Inspector\nRegistration status of Maximum members.".to_string(),
    ];

    if !active.is_empty() {
        blocks.push(render_section("Active members :approved:", active));
    }
    if !inactive.is_empty() {
        blocks.push(render_section("Inactive members :closed:", inactive));
    }
    if blocks.len() == 1 {
        blocks.push("**No members are registered yet.**".to_string());
    }

    blocks.join("\n\n")
}

fn render_section(title: &str, members: Vec<Member>) -> String {
    let count = members.len();
    let lines = sort_members(members)
        .iter()
        .map(render_member)
        .collect::<Vec<_>>()
        .join("\n");
    format!("### {} ({})\n{}", title, count, lines)
}

fn render_member(member: &Member) -> String {
    let grades = member
        .grades
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("- {} ({})", member.name, grades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grade::parse_grade;

    fn graded(name: &str, tokens: &[&str], is_active: bool) -> Member {
        let grades = tokens.iter().map(|t| parse_grade(t).unwrap()).collect();
        Member::new(name, grades, is_active)
    }

    #[test]
    fn test_render_empty_roster() {
        let rendered = render_members(Vec::new());
        assert!(rendered.starts_with("## Maximum Members Inspector"));
        assert!(rendered.ends_with("**No members are registered yet.**"));
    }

    #[test]
    fn test_render_member_line() {
        assert_eq!(
            render_member(&graded("Alice", &["21B", "25M"], true)),
            "- Alice (21B, 25M)"
        );
    }

    #[test]
    fn test_render_partitions_then_sorts() {
        let rendered = render_members(vec![
            graded("A", &["21B"], true),
            graded("B", &["23B"], true),
            graded("C", &["25B"], true),
            graded("D", &["21B", "25M"], true),
            graded("E", &["21B"], false),
            graded("F", &["21M"], true),
            graded("G", &["21M"], false),
        ]);

        let expected = "## Maximum Members Inspector\nRegistration status of Maximum members.\n\n\
### Active members :approved: (5)\n\
- F (21M)\n- D (21B, 25M)\n- A (21B)\n- B (23B)\n- C (25B)\n\n\
### Inactive members :closed: (2)\n\
- G (21M)\n- E (21B)";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_render_only_inactive_section() {
        let rendered = render_members(vec![graded("Z", &["19B"], false)]);
        assert!(!rendered.contains("Active members"));
        assert!(rendered.contains("### Inactive members :closed: (1)\n- Z (19B)"));
    }

    #[test]
    fn test_help_mentions_status_emoji() {
        let inspector = MembersInspector::new("http://localhost", Duration::from_secs(1));
        let help = inspector.help();
        assert!(help.starts_with("Base Commands: [ /members ]"));
        assert!(help.contains("show: Show the registration status of members"));
        assert!(help.contains(":approved: marks an active member."));
    }

    #[tokio::test]
    async fn test_fetch_members_reports_unreachable_endpoint() {
        let inspector = MembersInspector::new("http://127.0.0.1:9/members", Duration::from_secs(2));
        assert!(inspector.fetch_members().await.is_err());
    }
}

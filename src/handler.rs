// handler.rs - Event Handler and Module Loader
// Builds every bot module from the configuration and routes gateway events to
// them: slash commands go to the module owning the base command, modal
// submits to whichever module claims them, and voice state / message events
// to all modules.
//
// Used by: main.rs (client setup)

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use log::{debug, error, info, warn};
use serenity::{
    client::{Context, EventHandler},
    model::{
        application::{
            command::Command,
            interaction::{
                application_command::ApplicationCommandInteraction, modal::ModalSubmitInteraction,
                Interaction, InteractionResponseType,
            },
        },
        channel::Message,
        gateway::Ready,
        voice::VoiceState,
    },
};
use uuid::Uuid;

use crate::commands::{
    inspector::MembersInspector, picker::MembersPicker, reply, sub_command, tex::TexExporter,
    times::TimesManager, vc_notifier::VoiceChannelNotifier, BotModule, SUB_COMMAND_HELP,
    SUB_COMMAND_INFO,
};
use crate::config::BotConfig;
use crate::error::{BotError, BotResult};

pub struct Handler {
    modules: Vec<Box<dyn BotModule>>,
}

impl Handler {
    pub fn new(config: &BotConfig) -> Self {
        let timeout = Duration::from_secs(config.http_timeout_secs);
        let modules: Vec<Box<dyn BotModule>> = vec![
            Box::new(VoiceChannelNotifier::new(
                config.notify_channel_id,
                config.quiet_hours.clone(),
            )),
            Box::new(MembersInspector::new(config.members_api_endpoint.clone(), timeout)),
            Box::new(MembersPicker),
            Box::new(TexExporter::new(config.tex_render_endpoint.clone(), timeout)),
            Box::new(TimesManager::new(config.alumnus_role.clone())),
        ];
        Self { modules }
    }

    pub fn modules(&self) -> &[Box<dyn BotModule>] {
        &self.modules
    }

    fn module_for(&self, command_name: &str) -> Option<&dyn BotModule> {
        self.modules
            .iter()
            .find(|module| module.owns_command(command_name))
            .map(|module| module.as_ref())
    }

    async fn dispatch_command(&self, ctx: &Context, command: &ApplicationCommandInteraction) {
        let trace_id = Uuid::new_v4().to_string();
        let name = command.data.name.as_str();
        let (sub, options) = sub_command(command).unwrap_or(("", &[][..]));

        info!(
            "[{}] /{} {} by {} ({})",
            trace_id, name, sub, command.user.name, command.user.id
        );

        let module = match self.module_for(name) {
            Some(module) => module,
            None => {
                warn!("[{}] No module owns /{}", trace_id, name);
                if let Err(e) = reply(ctx, command, format!("Unknown command: {}", name), true).await {
                    error!("[{}] Failed to answer unknown command: {}", trace_id, e);
                }
                return;
            }
        };

        let result: BotResult = match sub {
            SUB_COMMAND_HELP => reply(ctx, command, module.help(), false).await.map_err(BotError::from),
            SUB_COMMAND_INFO => reply(ctx, command, module.info(), false).await.map_err(BotError::from),
            _ => module.handle_command(ctx, command, sub, options, &trace_id).await,
        };

        match result {
            Ok(()) => debug!("[{}] /{} {} completed", trace_id, name, sub),
            Err(e) => {
                error!("[{}] /{} {} failed in {}: {}", trace_id, name, sub, module.name(), e);
                report_failure(ctx, command, &e).await;
            }
        }
    }

    async fn dispatch_modal(&self, ctx: &Context, modal: &ModalSubmitInteraction) {
        for module in &self.modules {
            match module.handle_modal(ctx, modal).await {
                Ok(true) => return,
                Ok(false) => continue,
                Err(e) => {
                    error!("Modal {} failed in {}: {}", modal.data.custom_id, module.name(), e);
                    report_modal_failure(ctx, modal, &e).await;
                    return;
                }
            }
        }
        warn!("No module handled modal {}", modal.data.custom_id);
    }

    fn log_failures(&self, event: &str, results: Vec<BotResult>) {
        for (module, result) in self.modules.iter().zip(results) {
            if let Err(e) = result {
                error!("{} handler failed in {}: {}", event, module.name(), e);
            }
        }
    }
}

fn failure_message(e: &BotError) -> String {
    format!("Something went wrong: {}", e)
}

/// Tell the user a command failed, whether or not it was answered already.
async fn report_failure(ctx: &Context, command: &ApplicationCommandInteraction, e: &BotError) {
    let content = failure_message(e);
    if reply(ctx, command, &content, true).await.is_ok() {
        return;
    }
    if let Err(followup_error) = command
        .create_followup_message(&ctx.http, |message| message.content(&content).ephemeral(true))
        .await
    {
        error!("Failed to report command failure: {}", followup_error);
    }
}

/// Modal handlers acknowledge the submit before doing their work, so the
/// failure replaces that acknowledgement. Unacknowledged submits get a
/// fresh ephemeral reply.
async fn report_modal_failure(ctx: &Context, modal: &ModalSubmitInteraction, e: &BotError) {
    let content = failure_message(e);
    if modal
        .edit_original_interaction_response(&ctx.http, |response| response.content(&content))
        .await
        .is_ok()
    {
        return;
    }
    let replied = modal
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content(&content).ephemeral(true))
        })
        .await;
    if replied.is_ok() {
        return;
    }
    if let Err(followup_error) = modal
        .create_followup_message(&ctx.http, |message| message.content(&content).ephemeral(true))
        .await
    {
        error!("Failed to report modal failure: {}", followup_error);
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Bot connected as {}! ({} guilds)", ready.user.name, ready.guilds.len());

        let registered = Command::set_global_application_commands(&ctx.http, |commands| {
            for module in &self.modules {
                module.register_commands(commands);
            }
            commands
        })
        .await;

        match registered {
            Ok(commands) => {
                info!("Registered {} slash commands", commands.len());
                for module in &self.modules {
                    debug!("Loaded module {} v{}", module.name(), module.version());
                }
            }
            Err(e) => error!("Failed to register slash commands: {}", e),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::ApplicationCommand(command) => self.dispatch_command(&ctx, &command).await,
            Interaction::ModalSubmit(modal) => self.dispatch_modal(&ctx, &modal).await,
            _ => {}
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let results = join_all(
            self.modules
                .iter()
                .map(|module| module.handle_voice_state(&ctx, old.as_ref(), &new)),
        )
        .await;
        self.log_failures("Voice state", results);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let results = join_all(self.modules.iter().map(|module| module.handle_message(&ctx, &msg))).await;
        self.log_failures("Message", results);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn handler() -> Handler {
        let map: HashMap<String, String> = [("DISCORD_TOKEN", "token"), ("NOTIFY_CHANNEL_ID", "1")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Handler::new(&BotConfig::from_map(&map).unwrap())
    }

    #[test]
    fn test_loads_all_modules() {
        let names: Vec<&str> = handler().modules().iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            [
                "VC Notifier",
                "Maximum Members Inspector",
                "Members Picker",
                "TexExporter",
                "Times Manager"
            ]
        );
    }

    #[test]
    fn test_base_commands_are_unique() {
        let handler = handler();
        let mut seen = HashSet::new();
        for module in handler.modules() {
            for command in module.base_commands() {
                assert!(seen.insert(*command), "duplicate base command /{}", command);
            }
        }
    }

    #[test]
    fn test_module_for_routes_aliases() {
        let handler = handler();
        assert_eq!(handler.module_for("vcn").map(|m| m.name()), Some("VC Notifier"));
        assert_eq!(handler.module_for("pick").map(|m| m.name()), Some("Members Picker"));
        assert_eq!(handler.module_for("members").map(|m| m.name()), Some("Maximum Members Inspector"));
        assert!(handler.module_for("lm").is_none());
    }

    #[test]
    fn test_failure_message_carries_cause() {
        let e = BotError::InvalidReference("target1".to_string());
        assert_eq!(
            failure_message(&e),
            "Something went wrong: Unsupported mention in option `target1`"
        );
    }

    #[test]
    fn test_every_module_offers_help_and_info() {
        for module in handler().modules() {
            let subs: Vec<&str> = module.sub_commands().iter().map(|(sub, _)| *sub).collect();
            assert!(subs.contains(&SUB_COMMAND_HELP), "{} lacks help", module.name());
            assert!(subs.contains(&SUB_COMMAND_INFO), "{} lacks info", module.name());
        }
    }
}

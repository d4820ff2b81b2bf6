// vc_notifier.rs - Voice Channel Notifier Module
// Posts an embed to the notification channel whenever someone joins, leaves or
// moves between voice channels. Notifications can be switched off with
// /vc-notifier disable and are muted during the configured quiet hours.
//
// Used by: handler.rs (module list)

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Local, Timelike};
use log::{debug, info};
use serenity::{
    client::Context,
    model::{
        application::interaction::application_command::{ApplicationCommandInteraction, CommandDataOption},
        id::{ChannelId, GuildId},
        voice::VoiceState,
    },
};

use super::{reply, BotModule, SUB_COMMAND_HELP, SUB_COMMAND_INFO};
use crate::error::BotResult;

const SUB_COMMAND_ENABLE: &str = "enable";
const SUB_COMMAND_DISABLE: &str = "disable";

const USER_IMAGE_NOT_FOUND_URL: &str = "https://images.unsplash.com/photo-1614680376739-414d95ff43df?ixlib=rb-4.0.3&auto=format&fit=crop&w=1374&q=80";
const UNKNOWN_MEMBER: &str = "unknown";

/// What happened between two voice states of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceTransition {
    Join(ChannelId),
    Leave(ChannelId),
    Move { from: ChannelId, to: ChannelId },
}

impl VoiceTransition {
    /// Mute/deafen/stream changes inside one channel are not transitions.
    pub fn classify(old: Option<ChannelId>, new: Option<ChannelId>) -> Option<Self> {
        match (old, new) {
            (None, Some(to)) => Some(VoiceTransition::Join(to)),
            (Some(from), None) => Some(VoiceTransition::Leave(from)),
            (Some(from), Some(to)) if from != to => Some(VoiceTransition::Move { from, to }),
            _ => None,
        }
    }

    /// The channel the notification talks about.
    pub fn channel(&self) -> ChannelId {
        match *self {
            VoiceTransition::Join(channel) | VoiceTransition::Leave(channel) => channel,
            VoiceTransition::Move { to, .. } => to,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            VoiceTransition::Join(_) => "VC Join",
            VoiceTransition::Leave(_) => "VC Leave",
            VoiceTransition::Move { .. } => "VC Move",
        }
    }

    fn describe(&self, member_name: &str, channel_name: &str) -> String {
        match self {
            VoiceTransition::Join(_) => format!("{} joined {}", member_name, channel_name),
            VoiceTransition::Leave(_) => format!("{} left {}", member_name, channel_name),
            VoiceTransition::Move { .. } => format!("{} moved to {}", member_name, channel_name),
        }
    }

    fn colour(&self) -> u32 {
        match self {
            VoiceTransition::Join(_) => 0xff0000,
            VoiceTransition::Leave(_) => 0x0000ff,
            VoiceTransition::Move { .. } => 0x00ff00,
        }
    }
}

pub struct VoiceChannelNotifier {
    // Events are dispatched concurrently, so the toggle is atomic
    enabled: AtomicBool,
    notify_channel: ChannelId,
    quiet_hours: Range<u32>,
}

impl VoiceChannelNotifier {
    pub fn new(notify_channel: ChannelId, quiet_hours: Range<u32>) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            notify_channel,
            quiet_hours,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn is_quiet_hour(&self, hour: u32) -> bool {
        self.quiet_hours.contains(&hour)
    }
}

fn voice_member_count(ctx: &Context, guild_id: Option<GuildId>, channel: ChannelId) -> usize {
    guild_id
        .and_then(|guild_id| ctx.cache.guild(guild_id))
        .map(|guild| {
            guild
                .voice_states
                .values()
                .filter(|state| state.channel_id == Some(channel))
                .count()
        })
        .unwrap_or(0)
}

#[async_trait]
impl BotModule for VoiceChannelNotifier {
    fn name(&self) -> &'static str {
        "VC Notifier"
    }

    fn description(&self) -> &'static str {
        "Notifies when members join, leave or move between voice channels"
    }

    fn version(&self) -> &'static str {
        "1.3.0"
    }

    fn author(&self) -> &'static str {
        "sor4chi"
    }

    fn base_commands(&self) -> &'static [&'static str] {
        &["vc-notifier", "vcn"]
    }

    fn sub_commands(&self) -> &'static [(&'static str, &'static str)] {
        &[
            (SUB_COMMAND_HELP, "Show help for VC Notifier"),
            (SUB_COMMAND_INFO, "Show information about VC Notifier"),
            (SUB_COMMAND_DISABLE, "Disable voice channel notifications"),
            (SUB_COMMAND_ENABLE, "Enable voice channel notifications"),
        ]
    }

    async fn handle_command(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
        sub_command: &str,
        _options: &[CommandDataOption],
        trace_id: &str,
    ) -> BotResult {
        if command.guild_id.is_none() {
            reply(ctx, command, "This command can only be used inside a server.", true).await?;
            return Ok(());
        }

        let content = match sub_command {
            SUB_COMMAND_DISABLE => {
                self.set_enabled(false);
                "Notifications disabled."
            }
            SUB_COMMAND_ENABLE => {
                self.set_enabled(true);
                "Notifications enabled."
            }
            _ => {
                reply(ctx, command, "Unknown subcommand.", true).await?;
                return Ok(());
            }
        };
        info!("[VCN {}] {} by {}", trace_id, content, command.user.id);
        reply(ctx, command, content, false).await?;
        Ok(())
    }

    async fn handle_voice_state(&self, ctx: &Context, old: Option<&VoiceState>, new: &VoiceState) -> BotResult {
        if !self.is_enabled() || self.is_quiet_hour(Local::now().hour()) {
            return Ok(());
        }

        let transition = match VoiceTransition::classify(old.and_then(|s| s.channel_id), new.channel_id) {
            Some(transition) => transition,
            None => return Ok(()),
        };

        // The member is only on the old state when leaving
        let member = match transition {
            VoiceTransition::Leave(_) => old.and_then(|s| s.member.as_ref()).or(new.member.as_ref()),
            _ => new.member.as_ref(),
        };
        let member_name = member
            .map(|m| m.display_name().to_string())
            .unwrap_or_else(|| UNKNOWN_MEMBER.to_string());
        let avatar = member
            .and_then(|m| m.user.avatar_url())
            .unwrap_or_else(|| USER_IMAGE_NOT_FOUND_URL.to_string());

        let channel = transition.channel();
        let channel_name = match channel.to_channel(ctx).await?.guild() {
            Some(guild_channel) => guild_channel.name,
            None => channel.to_string(),
        };
        let member_count = voice_member_count(ctx, new.guild_id, channel);
        debug!("[VCN] {:?} by {} ({} in channel)", transition, member_name, member_count);

        let description = transition.describe(&member_name, &channel_name);
        let time = Local::now().format("%Y/%m/%d %H:%M:%S").to_string();

        self.notify_channel
            .send_message(&ctx.http, |message| {
                message.embed(|embed| {
                    embed
                        .title(transition.title())
                        .description(description)
                        .field("Members now", member_count, true)
                        .field("Time", time, true)
                        .image(avatar)
                        .colour(transition.colour())
                })
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_transitions() {
        let a = ChannelId(1);
        let b = ChannelId(2);

        assert_eq!(VoiceTransition::classify(None, Some(a)), Some(VoiceTransition::Join(a)));
        assert_eq!(VoiceTransition::classify(Some(a), None), Some(VoiceTransition::Leave(a)));
        assert_eq!(
            VoiceTransition::classify(Some(a), Some(b)),
            Some(VoiceTransition::Move { from: a, to: b })
        );
        assert_eq!(VoiceTransition::classify(Some(a), Some(a)), None);
        assert_eq!(VoiceTransition::classify(None, None), None);
    }

    #[test]
    fn test_transition_channel_and_text() {
        let moved = VoiceTransition::Move { from: ChannelId(1), to: ChannelId(2) };
        assert_eq!(moved.channel(), ChannelId(2));
        assert_eq!(moved.describe("alice", "general"), "alice moved to general");
        assert_eq!(moved.colour(), 0x00ff00);

        let left = VoiceTransition::Leave(ChannelId(1));
        assert_eq!(left.title(), "VC Leave");
        assert_eq!(left.describe("bob", "lounge"), "bob left lounge");
    }

    #[test]
    fn test_enabled_flag_defaults_on_and_toggles() {
        let notifier = VoiceChannelNotifier::new(ChannelId(1), 0..8);
        assert!(notifier.is_enabled());
        notifier.set_enabled(false);
        assert!(!notifier.is_enabled());
        notifier.set_enabled(true);
        assert!(notifier.is_enabled());
    }

    #[test]
    fn test_quiet_hours_window() {
        let notifier = VoiceChannelNotifier::new(ChannelId(1), 0..8);
        assert!(notifier.is_quiet_hour(0));
        assert!(notifier.is_quiet_hour(7));
        assert!(!notifier.is_quiet_hour(8));
        assert!(!notifier.is_quiet_hour(23));

        let never = VoiceChannelNotifier::new(ChannelId(1), 0..0);
        assert!((0..24).all(|hour| !never.is_quiet_hour(hour)));
    }

    #[test]
    fn test_help_lists_both_base_commands() {
        let notifier = VoiceChannelNotifier::new(ChannelId(1), 0..8);
        assert!(notifier.help().starts_with("Base Commands: [ /vc-notifier, /vcn ]"));
    }
}

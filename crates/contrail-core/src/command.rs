//! The `particles [rainbow|cloud]` player command.
//!
//! Parsing, permission checks, and reply selection live here; the actual
//! state change is [`EmitterRegistry::toggle`]. Replies are typed so the
//! caller decides how to deliver them, and [`CommandReply::message`] maps
//! each one to its configured text.

use contrail_types::{PlayerId, Variant};
use tracing::debug;

use crate::config::MessagesConfig;
use crate::host::SHOW_PERMISSION;
use crate::registry::{EmitterRegistry, ToggleOutcome};

/// Name the command is registered under.
pub const COMMAND_NAME: &str = "particles";

/// Who issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSender {
    /// The server console or another non-player source.
    Console,
    /// An online player.
    Player(PlayerId),
}

/// Outcome of a `particles` invocation, one per configured message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandReply {
    /// The trail was turned on.
    Enabled(Variant),
    /// The trail was turned off.
    Disabled,
    /// The trail is already on with the requested variant.
    AlreadyEnabled,
    /// The argument was not a known variant, or there were too many.
    InvalidType,
    /// The sender lacks the show permission.
    NoPermission,
    /// The sender is not a player.
    PlayersOnly,
    /// Trails are shutting down and cannot be toggled.
    Unavailable,
}

impl CommandReply {
    /// The configured text for this reply.
    pub fn message<'a>(self, messages: &'a MessagesConfig) -> &'a str {
        match self {
            Self::Enabled(_) => &messages.particles_enabled,
            Self::Disabled => &messages.particles_disabled,
            Self::AlreadyEnabled => &messages.particles_already_enabled,
            Self::InvalidType => &messages.invalid_type,
            Self::NoPermission => &messages.no_permission,
            Self::PlayersOnly => &messages.command_only_for_players,
            Self::Unavailable => &messages.particles_unavailable,
        }
    }
}

impl From<ToggleOutcome> for CommandReply {
    fn from(outcome: ToggleOutcome) -> Self {
        match outcome {
            ToggleOutcome::Enabled(variant) => Self::Enabled(variant),
            ToggleOutcome::Disabled => Self::Disabled,
            ToggleOutcome::AlreadyEnabled => Self::AlreadyEnabled,
            ToggleOutcome::Closed => Self::Unavailable,
        }
    }
}

/// Parse the command arguments into an optional variant.
///
/// Accepts no arguments (`Ok(None)`) or exactly one variant name, case
/// insensitive. Anything else is rejected with
/// [`CommandReply::InvalidType`].
///
/// # Errors
///
/// Returns [`CommandReply::InvalidType`] for an unknown name or more than
/// one argument.
pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<Option<Variant>, CommandReply> {
    match args {
        [] => Ok(None),
        [name] => name
            .as_ref()
            .parse::<Variant>()
            .map(Some)
            .map_err(|_err| CommandReply::InvalidType),
        _ => Err(CommandReply::InvalidType),
    }
}

/// Run `particles` for `sender` with `args`.
pub async fn run_particles_command<S: AsRef<str>>(
    registry: &EmitterRegistry,
    sender: CommandSender,
    args: &[S],
) -> CommandReply {
    let CommandSender::Player(player) = sender else {
        return CommandReply::PlayersOnly;
    };
    if !registry
        .context()
        .host()
        .has_permission(player, SHOW_PERMISSION)
    {
        debug!(player = %player, "Command refused, missing permission");
        return CommandReply::NoPermission;
    }

    match parse_args(args) {
        Ok(requested) => registry.toggle(player, requested).await.into(),
        Err(reply) => {
            debug!(player = %player, args = args.len(), "Command refused, invalid type");
            reply
        }
    }
}

/// Variant names completing the argument being typed.
///
/// Only the first argument completes; later positions yield nothing.
pub fn tab_complete<S: AsRef<str>>(args: &[S]) -> Vec<&'static str> {
    let prefix = match args {
        [] => "",
        [partial] => partial.as_ref(),
        _ => return Vec::new(),
    };
    let prefix = prefix.to_ascii_lowercase();
    Variant::ALL
        .iter()
        .map(|v| v.name())
        .filter(|name| name.starts_with(&prefix))
        .collect()
}

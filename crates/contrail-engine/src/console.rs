//! Line-oriented console that plays the part of the game server.
//!
//! Each line is one event or query:
//!
//! | Line | Effect |
//! |------|--------|
//! | `join <name>` | player connects |
//! | `move <name> <x> <y> <z> [world]` | position update (may activate a trail) |
//! | `fly <name> on\|off` | change the flying state |
//! | `grant <name>` / `revoke <name>` | toggle the `particles.show` permission |
//! | `particles <name\|console> [variant]` | run the player command |
//! | `complete [partial]` | tab-complete the command argument |
//! | `quit <name>` | player disconnects |
//! | `status` | list running emitters |
//! | `stop` | shut down |

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use contrail_core::activation::{Activation, ActivationTrigger};
use contrail_core::command::{self, CommandSender};
use contrail_core::config::MessagesConfig;
use contrail_core::host::{MemoryHost, SHOW_PERMISSION};
use contrail_core::registry::EmitterRegistry;
use contrail_types::{PlayerId, Position};
use tracing::{debug, info};

/// World used when `move` names none.
const DEFAULT_WORLD: &str = "overworld";

/// Name that issues `particles` as the console rather than a player.
const CONSOLE_SENDER: &str = "console";

/// Reasons a console line is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    /// The first word is not a known command.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// The command is known but its arguments are wrong.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// A coordinate did not parse as a number.
    #[error("invalid coordinate '{0}'")]
    BadCoordinate(String),

    /// The named player is not online.
    #[error("no player named '{0}' is online")]
    UnknownPlayer(String),
}

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// A player connects.
    Join {
        /// Player name.
        name: String,
    },
    /// A player moves.
    Move {
        /// Player name.
        name: String,
        /// New position.
        position: Position,
    },
    /// A player starts or stops flying.
    Fly {
        /// Player name.
        name: String,
        /// New flying state.
        flying: bool,
    },
    /// Grant or revoke the show permission.
    Permission {
        /// Player name.
        name: String,
        /// Whether the permission is granted.
        granted: bool,
    },
    /// Run `particles` as a player or the console.
    Particles {
        /// Player name, or `console`.
        sender: String,
        /// Raw command arguments.
        args: Vec<String>,
    },
    /// Tab-complete the `particles` argument.
    Complete {
        /// Arguments typed so far.
        args: Vec<String>,
    },
    /// A player disconnects.
    Quit {
        /// Player name.
        name: String,
    },
    /// List running emitters.
    Status,
    /// Shut down.
    Stop,
}

impl ConsoleCommand {
    /// Parse one console line. Blank lines yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError`] for an unknown command, missing arguments,
    /// or a non-numeric coordinate.
    pub fn parse(line: &str) -> Result<Option<Self>, ConsoleError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, rest)) = words.split_first() else {
            return Ok(None);
        };

        let command = match (verb.to_ascii_lowercase().as_str(), rest) {
            ("join", [name]) => Self::Join {
                name: (*name).to_owned(),
            },
            ("join", _) => return Err(ConsoleError::Usage("join <name>")),
            ("move", [name, x, y, z, world @ ..]) if world.len() <= 1 => Self::Move {
                name: (*name).to_owned(),
                position: Position::new(
                    world.first().copied().unwrap_or(DEFAULT_WORLD),
                    coordinate(x)?,
                    coordinate(y)?,
                    coordinate(z)?,
                ),
            },
            ("move", _) => return Err(ConsoleError::Usage("move <name> <x> <y> <z> [world]")),
            ("fly", [name, state]) => Self::Fly {
                name: (*name).to_owned(),
                flying: match state.to_ascii_lowercase().as_str() {
                    "on" | "true" => true,
                    "off" | "false" => false,
                    _ => return Err(ConsoleError::Usage("fly <name> on|off")),
                },
            },
            ("fly", _) => return Err(ConsoleError::Usage("fly <name> on|off")),
            ("grant" | "revoke", [name]) => Self::Permission {
                name: (*name).to_owned(),
                granted: verb.eq_ignore_ascii_case("grant"),
            },
            ("grant" | "revoke", _) => return Err(ConsoleError::Usage("grant|revoke <name>")),
            ("particles", [sender, args @ ..]) => Self::Particles {
                sender: (*sender).to_owned(),
                args: args.iter().map(|a| (*a).to_owned()).collect(),
            },
            ("particles", []) => {
                return Err(ConsoleError::Usage("particles <name|console> [variant]"));
            }
            ("complete", args) => Self::Complete {
                args: args.iter().map(|a| (*a).to_owned()).collect(),
            },
            ("quit", [name]) => Self::Quit {
                name: (*name).to_owned(),
            },
            ("quit", _) => return Err(ConsoleError::Usage("quit <name>")),
            ("status", []) => Self::Status,
            ("stop", []) => Self::Stop,
            _ => return Err(ConsoleError::UnknownCommand(verb.to_owned())),
        };
        Ok(Some(command))
    }
}

fn coordinate(raw: &str) -> Result<f64, ConsoleError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConsoleError::BadCoordinate(raw.to_owned()))
}

/// Whether the console loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Shut down.
    Stop,
}

/// The simulated server: players by name plus the trail subsystem.
///
/// A name keeps its [`PlayerId`] across quit and rejoin, so stored
/// preferences follow the player between sessions.
#[derive(Debug)]
pub struct Console {
    host: Arc<MemoryHost>,
    registry: Arc<EmitterRegistry>,
    trigger: ActivationTrigger,
    messages: MessagesConfig,
    players: BTreeMap<String, PlayerId>,
}

impl Console {
    /// Build a console over an existing host and registry.
    pub fn new(
        host: Arc<MemoryHost>,
        registry: Arc<EmitterRegistry>,
        messages: MessagesConfig,
    ) -> Self {
        Self {
            host,
            trigger: ActivationTrigger::new(Arc::clone(&registry)),
            registry,
            messages,
            players: BTreeMap::new(),
        }
    }

    /// Run one command and return the text to show the operator.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::UnknownPlayer`] when the command names a
    /// player who is not online.
    pub async fn execute(
        &mut self,
        command: ConsoleCommand,
    ) -> Result<(Flow, String), ConsoleError> {
        let reply = match command {
            ConsoleCommand::Join { name } => {
                let player = *self.players.entry(name.clone()).or_insert_with(PlayerId::new);
                self.host.join(player);
                info!(name = %name, player = %player, "Player joined");
                format!("{name} joined as {player}")
            }
            ConsoleCommand::Move { name, position } => {
                let player = self.player(&name)?;
                self.host.set_position(player, position);
                let activation = self.trigger.on_position_update(player).await;
                if activation == Activation::Started {
                    format!("{name} moved; trail started")
                } else {
                    format!("{name} moved")
                }
            }
            ConsoleCommand::Fly { name, flying } => {
                let player = self.player(&name)?;
                self.host.set_flying(player, flying);
                debug!(name = %name, flying, "Flying state changed");
                format!("{name} is {}", if flying { "flying" } else { "grounded" })
            }
            ConsoleCommand::Permission { name, granted } => {
                let player = self.player(&name)?;
                if granted {
                    self.host.grant(player, SHOW_PERMISSION);
                } else {
                    self.host.revoke(player, SHOW_PERMISSION);
                }
                format!(
                    "{SHOW_PERMISSION} {} {name}",
                    if granted { "granted to" } else { "revoked from" }
                )
            }
            ConsoleCommand::Particles { sender, args } => {
                let sender = if sender.eq_ignore_ascii_case(CONSOLE_SENDER) {
                    CommandSender::Console
                } else {
                    CommandSender::Player(self.player(&sender)?)
                };
                let reply = command::run_particles_command(&self.registry, sender, args.as_slice()).await;
                reply.message(&self.messages).to_owned()
            }
            ConsoleCommand::Complete { args } => command::tab_complete(args.as_slice()).join(" "),
            ConsoleCommand::Quit { name } => {
                let player = self.player(&name)?;
                self.registry.on_disconnect(player).await;
                self.host.leave(player);
                info!(name = %name, player = %player, "Player quit");
                format!("{name} left")
            }
            ConsoleCommand::Status => self.status().await,
            ConsoleCommand::Stop => return Ok((Flow::Stop, "stopping".to_owned())),
        };
        Ok((Flow::Continue, reply))
    }

    fn player(&self, name: &str) -> Result<PlayerId, ConsoleError> {
        self.players
            .get(name)
            .copied()
            .filter(|&player| self.host.is_online(player))
            .ok_or_else(|| ConsoleError::UnknownPlayer(name.to_owned()))
    }

    async fn status(&self) -> String {
        let active = self.registry.active().await;
        let online = self
            .players
            .values()
            .filter(|&&player| self.host.is_online(player))
            .count();
        let mut out = format!("{online} online, {} emitting", active.len());
        for info in active {
            let name = self
                .players
                .iter()
                .find(|(_, id)| **id == info.player)
                .map_or("?", |(name, _)| name.as_str());
            let _ = write!(
                out,
                "\n  {name}: {} ({} firings, {} particles, since {})",
                info.variant,
                info.firings,
                info.emitted,
                info.started_at.format("%H:%M:%S")
            );
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use contrail_core::color_cycle::ColorCycle;
    use contrail_core::config::ParticleConfig;
    use contrail_core::emitter::EmitterContext;
    use contrail_core::host::{Host, RecordingSink, RenderSink};
    use contrail_core::preferences::{MemoryPreferenceStore, PreferenceStore};

    use super::*;

    fn console() -> Console {
        let host = Arc::new(MemoryHost::new());
        let ctx = Arc::new(EmitterContext::new(
            Arc::clone(&host) as Arc<dyn Host>,
            Arc::new(RecordingSink::new()) as Arc<dyn RenderSink>,
            Arc::new(ColorCycle::rainbow()),
            ParticleConfig::default(),
            Duration::from_millis(50),
        ));
        let store: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());
        let registry = Arc::new(EmitterRegistry::new(ctx, store));
        Console::new(host, registry, MessagesConfig::default())
    }

    async fn run(console: &mut Console, line: &str) -> String {
        let command = ConsoleCommand::parse(line).unwrap().unwrap();
        console.execute(command).await.unwrap().1
    }

    #[test]
    fn parses_move_with_default_world() {
        let command = ConsoleCommand::parse("move alex 1 64.5 -3").unwrap();
        assert_eq!(
            command,
            Some(ConsoleCommand::Move {
                name: "alex".to_owned(),
                position: Position::new(DEFAULT_WORLD, 1.0, 64.5, -3.0),
            })
        );
    }

    #[test]
    fn parses_particles_arguments() {
        assert_eq!(
            ConsoleCommand::parse("PARTICLES alex Cloud").unwrap(),
            Some(ConsoleCommand::Particles {
                sender: "alex".to_owned(),
                args: vec!["Cloud".to_owned()],
            })
        );
    }

    #[test]
    fn rejects_bad_lines() {
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), None);
        assert!(matches!(
            ConsoleCommand::parse("dance"),
            Err(ConsoleError::UnknownCommand(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("move alex 1 2"),
            Err(ConsoleError::Usage(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("move alex 1 up 2"),
            Err(ConsoleError::BadCoordinate(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("fly alex maybe"),
            Err(ConsoleError::Usage(_))
        ));
    }

    #[tokio::test]
    async fn unknown_player_is_reported() {
        let mut console = console();
        let command = ConsoleCommand::parse("fly ghost on").unwrap().unwrap();
        assert_eq!(
            console.execute(command).await.unwrap_err(),
            ConsoleError::UnknownPlayer("ghost".to_owned())
        );
    }

    #[tokio::test]
    async fn session_toggles_and_reactivates() {
        let mut console = console();
        run(&mut console, "join alex").await;
        run(&mut console, "grant alex").await;
        run(&mut console, "fly alex on").await;

        assert_eq!(
            run(&mut console, "particles alex cloud").await,
            "Particles enabled."
        );
        assert!(run(&mut console, "status").await.contains("alex: cloud"));

        run(&mut console, "quit alex").await;
        assert_eq!(console.registry.len().await, 0);

        run(&mut console, "join alex").await;
        run(&mut console, "grant alex").await;
        assert_eq!(
            run(&mut console, "move alex 0 70 0").await,
            "alex moved; trail started"
        );
        assert_eq!(
            run(&mut console, "particles alex").await,
            "Particles disabled."
        );
        console.registry.shutdown().await;
    }

    #[tokio::test]
    async fn console_sender_and_permission_replies() {
        let mut console = console();
        run(&mut console, "join sam").await;

        assert_eq!(
            run(&mut console, "particles console").await,
            "This command can only be used by players!"
        );
        assert_eq!(
            run(&mut console, "particles sam rainbow").await,
            "You don't have permission to use this command!"
        );
        run(&mut console, "grant sam").await;
        assert_eq!(
            run(&mut console, "particles sam sparkle").await,
            "Invalid particle type! Use 'rainbow' or 'cloud'."
        );
    }

    #[tokio::test]
    async fn complete_lists_matching_variants() {
        let mut console = console();
        assert_eq!(run(&mut console, "complete").await, "rainbow cloud");
        assert_eq!(run(&mut console, "complete ra").await, "rainbow");
    }

    #[tokio::test]
    async fn stop_ends_the_loop() {
        let mut console = console();
        let command = ConsoleCommand::parse("stop").unwrap().unwrap();
        assert_eq!(console.execute(command).await.unwrap().0, Flow::Stop);
    }
}

//! Command implementations for claimdesk.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, and the [`Desk`] session every command after `init`
//! opens: the resolved context, the loaded config, and a coordinator wired
//! to the desk's file stores and audit log.

pub mod add;
pub mod init;
pub mod list;
pub mod lock;
pub mod notices;
pub mod verbs;
pub mod watch;


use crate::cli::{Command, GlobalArgs, LockAction};
use crate::config::Config;
use crate::context::{DeskContext, require_initialized_desk};
use crate::coordinator::ClaimCoordinator;
use crate::error::{DeskError, Result};
use crate::events::EventLog;
use crate::gate::GateDenial;
use crate::operator::OperatorContext;
use crate::resource::{FileResourceRepository, ResourceKey};
use crate::store::FileLockStore;
use std::sync::Arc;

/// Dispatch a command to its implementation.
pub fn dispatch(global: &GlobalArgs, command: Command) -> Result<()> {
    match command {
        Command::Init => init::cmd_init(global),
        Command::Add(args) => add::cmd_add(global, args),
        Command::List(args) => list::cmd_list(global, args),
        Command::Claim(args) => verbs::cmd_claim(global, args),
        Command::Release(args) => verbs::cmd_release(global, args),
        Command::ForceRelease(args) => verbs::cmd_force_release(global, args),
        Command::SetStatus(args) => verbs::cmd_set_status(global, args),
        Command::Watch(args) => watch::cmd_watch(global, args),
        Command::Lock(lock_cmd) => match lock_cmd.action {
            LockAction::List => lock::cmd_lock_list(global),
            LockAction::Sweep => lock::cmd_lock_sweep(global),
        },
        Command::Notices(args) => notices::cmd_notices(global, args),
    }
}

/// An opened, initialized desk.
pub struct Desk {
    pub ctx: DeskContext,
    pub config: Config,
    pub coordinator: Arc<ClaimCoordinator>,
}

impl Desk {
    /// Open the desk named by `--root` (or found from the environment).
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let ctx = require_initialized_desk(global.root.as_deref())?;
        let config = Config::load_or_default(ctx.config_path())?;

        let coordinator = ClaimCoordinator::new(
            Arc::new(FileLockStore::new(&ctx.locks_dir)),
            Arc::new(FileResourceRepository::new(&ctx.resources_dir)),
        )
        .with_events(EventLog::new(ctx.events_file()))
        .with_lease(config.lease.clone());

        Ok(Self {
            ctx,
            config,
            coordinator: Arc::new(coordinator),
        })
    }

    /// The operator running this command.
    pub fn operator(&self, global: &GlobalArgs) -> Result<OperatorContext> {
        OperatorContext::resolve(global.operator.as_deref(), &self.config)
    }

    pub fn events(&self) -> EventLog {
        EventLog::new(self.ctx.events_file())
    }
}

/// Turn a local gate refusal into the error the CLI exits with.
pub(crate) fn denial_error(key: &ResourceKey, denial: GateDenial) -> DeskError {
    match denial {
        GateDenial::AlreadyClaimed => DeskError::Conflict(format!("{}: {}", key, denial)),
        GateDenial::Closed => DeskError::Terminal(key.to_string()),
        GateDenial::Unlisted => DeskError::NotFound(key.to_string()),
        GateDenial::NotClaimed => DeskError::UserError(format!("{}: {}", key, denial)),
        GateDenial::ClaimFirst
        | GateDenial::NotYourClaim
        | GateDenial::RequiresElevatedRole
        | GateDenial::ClaimedByOther => DeskError::Unauthorized(format!("{}: {}", key, denial)),
    }
}

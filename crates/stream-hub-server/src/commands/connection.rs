//! Session-level commands: idle, command lists, introspection, shutdown.

use std::sync::atomic::Ordering;

use mpd_proto::{Ack, AckCode, IdleFlags, COMMANDS};

use super::{Context, Handler, Reply};
use crate::server::session::CommandList;

pub(super) const HANDLERS: &[(&str, Handler)] = &[
    ("ping", ping),
    ("close", close),
    ("commands", commands),
    ("notcommands", notcommands),
    ("command_list_begin", command_list_begin),
    ("command_list_ok_begin", command_list_ok_begin),
    ("command_list_end", command_list_end),
    ("idle", idle),
    ("noidle", noidle),
    ("kill", kill),
];

fn ping(_ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    Ok(Reply::Ok)
}

fn close(_ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    Ok(Reply::Close)
}

fn commands(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    let permissions = ctx.session.permissions;
    for spec in COMMANDS.iter().filter(|spec| permissions.allows(spec.permission)) {
        ctx.line("command", spec.name);
    }
    Ok(Reply::Ok)
}

fn notcommands(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    let permissions = ctx.session.permissions;
    for spec in COMMANDS.iter().filter(|spec| !permissions.allows(spec.permission)) {
        ctx.line("command", spec.name);
    }
    Ok(Reply::Ok)
}

fn command_list_begin(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    ctx.session.command_list = Some(CommandList::new(false));
    Ok(Reply::Silent)
}

fn command_list_ok_begin(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    ctx.session.command_list = Some(CommandList::new(true));
    Ok(Reply::Silent)
}

/// Only reached outside a list; inside one the server replays the collected commands.
fn command_list_end(_ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    Err(Ack::new(AckCode::NotList, "command_list_end", "not in command list"))
}

fn idle(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let mut mask = IdleFlags::NONE;
    for name in args {
        let flag = IdleFlags::from_name(name)
            .ok_or_else(|| Ack::arg("idle", format!("Unrecognized idle event: {name}")))?;
        mask |= flag;
    }
    if mask.is_empty() {
        mask = IdleFlags::ALL;
    }
    match ctx.session.begin_idle(mask) {
        Some(changes) => {
            ctx.out.push_str(&changes);
            Ok(Reply::Ok)
        }
        None => Ok(Reply::Silent),
    }
}

fn noidle(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    if !ctx.session.is_idle() {
        return Ok(Reply::Silent);
    }
    if let Some(changes) = ctx.session.take_idle_delivery() {
        ctx.out.push_str(&changes);
    }
    ctx.session.end_idle();
    Ok(Reply::Ok)
}

fn kill(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    tracing::info!(client = ctx.session.id, "shutdown requested by client");
    ctx.shutdown.store(true, Ordering::SeqCst);
    Ok(Reply::Close)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use crate::commands::test_support::Fixture;
    use crate::commands::Reply;
    use mpd_proto::{AckCode, IdleFlags, Permissions};

    #[test]
    fn commands_and_notcommands_split_by_permission() {
        let mut fx = Fixture::with_permissions(Permissions::READ);
        let allowed = fx.ok("commands");
        assert!(allowed.contains(&"command: status".to_string()));
        assert!(!allowed.contains(&"command: add".to_string()));
        let denied = fx.ok("notcommands");
        assert!(denied.contains(&"command: add".to_string()));
        assert!(denied.contains(&"command: kill".to_string()));
        assert!(!denied.contains(&"command: ping".to_string()));
    }

    #[test]
    fn idle_waits_or_delivers_pending_changes() {
        let mut fx = Fixture::new();
        assert_eq!(fx.run("idle player").1, Ok(Reply::Silent));
        assert!(fx.session.is_idle());
        assert_eq!(fx.run("noidle"), (String::new(), Ok(Reply::Ok)));
        assert!(!fx.session.is_idle());

        assert_eq!(fx.run("idle options").1, Ok(Reply::Silent));
        fx.session.raise(IdleFlags::OPTIONS);
        assert_eq!(
            fx.run("noidle"),
            ("changed: options\n".to_string(), Ok(Reply::Ok))
        );

        fx.session.raise(IdleFlags::MIXER | IdleFlags::PLAYER);
        assert_eq!(
            fx.run("idle mixer options"),
            ("changed: mixer\n".to_string(), Ok(Reply::Ok))
        );
        assert!(!fx.session.is_idle());
        assert_eq!(
            fx.run("idle"),
            ("changed: player\n".to_string(), Ok(Reply::Ok))
        );
    }

    #[test]
    fn idle_rejects_unknown_category_and_noidle_outside_idle_is_silent() {
        let mut fx = Fixture::new();
        assert_eq!(
            fx.ack("idle bogus").message,
            "Unrecognized idle event: bogus"
        );
        assert_eq!(fx.run("noidle"), (String::new(), Ok(Reply::Silent)));
    }

    #[test]
    fn list_end_outside_list_and_kill() {
        let mut fx = Fixture::new();
        assert_eq!(fx.ack("command_list_end").code, AckCode::NotList);
        assert_eq!(fx.run("command_list_ok_begin").1, Ok(Reply::Silent));
        assert!(fx.session.command_list.as_ref().is_some_and(|l| l.verbose));
        assert_eq!(fx.run("kill").1, Ok(Reply::Close));
        assert!(fx.shutdown.load(Ordering::SeqCst));
    }
}

//! Transport, play-mode and mixer commands.

use mpd_proto::Ack;

use super::{parse_bool, parse_int, queue_ack, Context, Handler, Reply};
use crate::queue_engine::SingleMode;
use crate::song::SongId;

pub(super) const HANDLERS: &[(&str, Handler)] = &[
    ("play", play),
    ("playid", playid),
    ("pause", pause),
    ("stop", stop),
    ("next", next),
    ("previous", previous),
    ("random", random),
    ("repeat", repeat),
    ("consume", consume),
    ("single", single),
    ("setvol", setvol),
    ("volume", volume),
    ("getvol", getvol),
    ("clearerror", clearerror),
];

fn play(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    match args.first() {
        None => ctx.engine.play(),
        Some(arg) => {
            let pos = parse_int("play", arg)?;
            if pos < 0 {
                ctx.engine.play();
            } else {
                ctx.engine
                    .play_position(pos as usize)
                    .map_err(|e| queue_ack("play", e))?;
            }
        }
    }
    Ok(Reply::Ok)
}

fn playid(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    match args.first() {
        None => ctx.engine.play(),
        Some(arg) => {
            let id = parse_int("playid", arg)?;
            if id < 0 {
                ctx.engine.play();
            } else {
                let id = u32::try_from(id)
                    .map_err(|_| Ack::no_exist("playid", "No such song"))?;
                ctx.engine
                    .play_id(SongId(id))
                    .map_err(|e| queue_ack("playid", e))?;
            }
        }
    }
    Ok(Reply::Ok)
}

fn pause(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    match args.first() {
        None => ctx.engine.toggle_pause(),
        Some(arg) => {
            if parse_bool("pause", arg)? {
                ctx.engine.pause();
            } else {
                ctx.engine.resume();
            }
        }
    }
    Ok(Reply::Ok)
}

fn stop(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    ctx.engine.stop();
    Ok(Reply::Ok)
}

fn next(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    ctx.engine.next();
    Ok(Reply::Ok)
}

fn previous(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    ctx.engine.previous();
    Ok(Reply::Ok)
}

fn random(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    ctx.engine.set_random(parse_bool("random", &args[0])?);
    Ok(Reply::Ok)
}

fn repeat(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    ctx.engine.set_repeat(parse_bool("repeat", &args[0])?);
    Ok(Reply::Ok)
}

fn consume(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    ctx.engine.set_consume(parse_bool("consume", &args[0])?);
    Ok(Reply::Ok)
}

fn single(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let mode = match args[0].as_str() {
        "0" => SingleMode::Off,
        "1" => SingleMode::On,
        "oneshot" => SingleMode::Oneshot,
        other => {
            return Err(Ack::arg(
                "single",
                format!("Boolean (0/1) or 'oneshot' expected: {other}"),
            ));
        }
    };
    ctx.engine.set_single(mode);
    Ok(Reply::Ok)
}

fn setvol(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let percent = parse_int("setvol", &args[0])?;
    if !(0..=100).contains(&percent) {
        return Err(Ack::arg("setvol", "Invalid volume value"));
    }
    ctx.engine.set_volume(percent as f64 / 100.0);
    Ok(Reply::Ok)
}

/// Relative change, clamped to the mixer range.
fn volume(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let delta = parse_int("volume", &args[0])?;
    if !(-100..=100).contains(&delta) {
        return Err(Ack::arg("volume", "Invalid volume value"));
    }
    let target = (i64::from(ctx.engine.volume_percent()) + delta).clamp(0, 100);
    ctx.engine.set_volume(target as f64 / 100.0);
    Ok(Reply::Ok)
}

fn getvol(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    let volume = ctx.engine.volume_percent();
    ctx.line("volume", volume);
    Ok(Reply::Ok)
}

fn clearerror(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    ctx.engine.clear_error();
    Ok(Reply::Ok)
}

//! Read-only reporting commands.

use mpd_proto::Ack;

use super::{Context, Handler, Reply};
use crate::backend::PlayState;

pub(super) const HANDLERS: &[(&str, Handler)] = &[
    ("status", status),
    ("stats", stats),
    ("outputs", outputs),
    ("decoders", decoders),
    ("tagtypes", tagtypes),
    ("urlhandlers", urlhandlers),
];

const TAG_TYPES: &[&str] = &["Artist", "Album", "AlbumArtist", "Title", "Genre", "Date", "Comment"];
const URL_HANDLERS: &[&str] = &["file://", "http://", "https://"];
const DECODER_SUFFIXES: &[&str] = &["mp3", "ogg", "opus", "flac", "m4a", "aac", "wav"];

fn status(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    let status = ctx.engine.status();
    ctx.line("volume", status.volume);
    ctx.line("repeat", u8::from(status.options.repeat));
    ctx.line("random", u8::from(status.options.random));
    ctx.line("single", status.options.single.as_str());
    ctx.line("consume", u8::from(status.options.consume));
    ctx.line("playlist", status.playlist_version);
    ctx.line("playlistlength", status.playlist_length);
    ctx.line("state", status.state.as_str());
    if let Some((pos, id)) = status.song {
        ctx.line("song", pos);
        ctx.line("songid", id);
        if status.state != PlayState::Stopped {
            ctx.line(
                "time",
                format!("{}:{}", status.elapsed.as_secs(), status.duration.as_secs()),
            );
            ctx.line("elapsed", format!("{:.3}", status.elapsed.as_secs_f64()));
            ctx.line("duration", format!("{:.3}", status.duration.as_secs_f64()));
        }
    }
    if let Some((pos, id)) = status.next {
        ctx.line("nextsong", pos);
        ctx.line("nextsongid", id);
    }
    if let Some(error) = status.error {
        ctx.line("error", error);
    }
    Ok(Reply::Ok)
}

fn stats(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    let stats = ctx.engine.stats();
    ctx.line("uptime", stats.uptime.as_secs());
    ctx.line("playtime", stats.playtime.as_secs());
    ctx.line("artists", stats.artists);
    ctx.line("albums", stats.albums);
    ctx.line("songs", stats.songs);
    ctx.line("db_playtime", stats.db_playtime.as_secs());
    Ok(Reply::Ok)
}

fn outputs(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    let name = ctx.engine.backend_name().to_string();
    ctx.line("outputid", 0);
    ctx.line("outputname", name);
    ctx.line("outputenabled", 1);
    Ok(Reply::Ok)
}

fn decoders(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    let name = ctx.engine.backend_name().to_string();
    ctx.line("plugin", name);
    for suffix in DECODER_SUFFIXES {
        ctx.line("suffix", suffix);
    }
    Ok(Reply::Ok)
}

fn tagtypes(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    for tag in TAG_TYPES {
        ctx.line("tagtype", tag);
    }
    Ok(Reply::Ok)
}

fn urlhandlers(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    for handler in URL_HANDLERS {
        ctx.line("handler", handler);
    }
    Ok(Reply::Ok)
}

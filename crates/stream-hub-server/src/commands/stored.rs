//! Stored playlist commands.

use std::time::{Duration, SystemTime};

use mpd_proto::{Ack, AckCode, IdleFlags};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::{queue_ack, Context, Handler, Reply};
use crate::queue_engine::SongSeed;
use crate::stored_playlists::{PlaylistFileError, StoredEntry};

pub(super) const HANDLERS: &[(&str, Handler)] = &[
    ("save", save),
    ("load", load),
    ("listplaylists", listplaylists),
    ("rm", rm),
];

fn file_ack(command: &str, err: PlaylistFileError) -> Ack {
    match err {
        PlaylistFileError::InvalidName => Ack::arg(command, "Bad playlist name"),
        PlaylistFileError::NotFound => Ack::no_exist(command, err.to_string()),
        PlaylistFileError::AlreadyExists => Ack::new(AckCode::Exist, command, err.to_string()),
        PlaylistFileError::Io(e) => {
            tracing::warn!(command, error = %e, "playlist file error");
            Ack::system(command, e.to_string())
        }
    }
}

fn save(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let entries: Vec<StoredEntry> = ctx
        .engine
        .playlist()
        .iter()
        .map(|song| StoredEntry {
            source_url: song.source_url.clone(),
            title: song.title.clone(),
            duration_secs: song.duration.as_secs(),
            resolved_url: song.resolved_url.clone(),
            thumbnail_url: song.thumbnail_url.clone(),
            tags: song.tags.clone(),
        })
        .collect();
    ctx.store
        .save(&args[0], &entries)
        .map_err(|e| file_ack("save", e))?;
    *ctx.changed |= IdleFlags::STORED_PLAYLIST;
    Ok(Reply::Ok)
}

fn load(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let entries = ctx.store.load(&args[0]).map_err(|e| file_ack("load", e))?;
    for entry in entries {
        let id = ctx
            .engine
            .add_song(&entry.source_url, None)
            .map_err(|e| queue_ack("load", e))?;
        ctx.engine.seed_metadata(
            id,
            SongSeed {
                title: entry.title,
                duration: Duration::from_secs(entry.duration_secs),
                thumbnail_url: entry.thumbnail_url,
                tags: entry.tags,
            },
        );
    }
    Ok(Reply::Ok)
}

fn last_modified(at: SystemTime) -> Option<String> {
    let at = OffsetDateTime::from(at);
    at.replace_nanosecond(0).unwrap_or(at).format(&Rfc3339).ok()
}

fn listplaylists(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    let playlists = ctx
        .store
        .list()
        .map_err(|e| file_ack("listplaylists", e))?;
    for info in playlists {
        ctx.line("playlist", &info.name);
        if let Some(stamp) = info.modified.and_then(last_modified) {
            ctx.line("Last-Modified", stamp);
        }
    }
    Ok(Reply::Ok)
}

fn rm(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    ctx.store.remove(&args[0]).map_err(|e| file_ack("rm", e))?;
    *ctx.changed |= IdleFlags::STORED_PLAYLIST;
    Ok(Reply::Ok)
}

//! Queue editing and listing.

use mpd_proto::Ack;

use super::{
    clamp_range, parse_int, parse_range, parse_unsigned, queue_ack, Context, Handler, Reply,
};
use crate::queue_engine::SongRef;
use crate::song::{Song, SongId};

pub(super) const HANDLERS: &[(&str, Handler)] = &[
    ("add", add),
    ("addid", addid),
    ("delete", delete),
    ("deleteid", deleteid),
    ("clear", clear),
    ("move", move_songs),
    ("moveid", moveid),
    ("shuffle", shuffle),
    ("playlistinfo", playlistinfo),
    ("playlistid", playlistid),
    ("plchanges", plchanges),
    ("plchangesposid", plchangesposid),
    ("playlistfind", playlistfind),
    ("playlistsearch", playlistsearch),
    ("currentsong", currentsong),
];

/// Append the song block for `song` at `position`.
pub(crate) fn write_song(out: &mut String, position: usize, song: &Song) {
    out.push_str(&format!("file: {}\n", song.source_url));
    if !song.title.is_empty() {
        out.push_str(&format!("Title: {}\n", song.title));
    }
    for (name, value) in &song.tags {
        out.push_str(&format!("{name}: {value}\n"));
    }
    if !song.duration.is_zero() {
        out.push_str(&format!("Time: {}\n", song.duration.as_secs()));
        out.push_str(&format!("duration: {:.3}\n", song.duration.as_secs_f64()));
    }
    out.push_str(&format!("Pos: {position}\nId: {}\n", song.id));
}

fn insert(ctx: &mut Context<'_>, command: &str, args: &[String]) -> Result<SongId, Ack> {
    let uri = args[0].trim();
    if uri.is_empty() {
        return Err(Ack::arg(command, "Malformed URI"));
    }
    let position = match args.get(1) {
        Some(arg) => Some(parse_unsigned(command, arg)? as usize),
        None => None,
    };
    ctx.engine
        .add_song(uri, position)
        .map_err(|e| queue_ack(command, e))
}

fn add(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    insert(ctx, "add", args)?;
    Ok(Reply::Ok)
}

fn addid(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let id = insert(ctx, "addid", args)?;
    ctx.line("Id", id);
    Ok(Reply::Ok)
}

/// `delete POS`, `delete START:END`, or anything non-numeric as a URL/title search.
fn delete(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let arg = args[0].as_str();
    if !arg.starts_with(|c: char| c.is_ascii_digit()) {
        return ctx
            .engine
            .remove_song(SongRef::Search(arg.to_string()))
            .map(|()| Reply::Ok)
            .map_err(|e| queue_ack("delete", e));
    }
    let range = clamp_range("delete", parse_range("delete", arg)?, ctx.engine.playlist().len())?;
    ctx.engine
        .remove_range(range)
        .map_err(|e| queue_ack("delete", e))?;
    Ok(Reply::Ok)
}

fn deleteid(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let id = parse_unsigned("deleteid", &args[0])?;
    ctx.engine
        .remove_song(SongRef::Id(SongId(id)))
        .map_err(|e| queue_ack("deleteid", e))?;
    Ok(Reply::Ok)
}

fn clear(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    ctx.engine.remove_all();
    Ok(Reply::Ok)
}

fn move_songs(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let range = clamp_range("move", parse_range("move", &args[0])?, ctx.engine.playlist().len())?;
    let to = parse_unsigned("move", &args[1])? as usize;
    ctx.engine
        .move_range(range, to)
        .map_err(|e| queue_ack("move", e))?;
    Ok(Reply::Ok)
}

fn moveid(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let id = parse_unsigned("moveid", &args[0])?;
    let to = parse_unsigned("moveid", &args[1])? as usize;
    ctx.engine
        .move_id(SongId(id), to)
        .map_err(|e| queue_ack("moveid", e))?;
    Ok(Reply::Ok)
}

fn shuffle(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    ctx.engine.shuffle();
    Ok(Reply::Ok)
}

fn playlistinfo(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let playlist = ctx.engine.playlist();
    let range = match args.first() {
        Some(arg) => clamp_range("playlistinfo", parse_range("playlistinfo", arg)?, playlist.len())?,
        None => 0..playlist.len(),
    };
    for pos in range {
        if let Some(song) = playlist.at(pos) {
            write_song(ctx.out, pos, song);
        }
    }
    Ok(Reply::Ok)
}

fn playlistid(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let playlist = ctx.engine.playlist();
    match args.first() {
        Some(arg) => {
            let id = SongId(parse_unsigned("playlistid", arg)?);
            let pos = playlist
                .position_of(id)
                .ok_or_else(|| Ack::no_exist("playlistid", "No such song"))?;
            if let Some(song) = playlist.get(id) {
                write_song(ctx.out, pos, song);
            }
        }
        None => {
            for (pos, song) in playlist.iter().enumerate() {
                write_song(ctx.out, pos, song);
            }
        }
    }
    Ok(Reply::Ok)
}

fn parse_version(command: &str, arg: &str) -> Result<u64, Ack> {
    Ok(parse_int(command, arg)?.max(0) as u64)
}

fn plchanges(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let version = parse_version("plchanges", &args[0])?;
    for (pos, song) in ctx.engine.playlist().changes_since(version) {
        write_song(ctx.out, pos, song);
    }
    Ok(Reply::Ok)
}

fn plchangesposid(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    let version = parse_version("plchangesposid", &args[0])?;
    for (pos, song) in ctx.engine.playlist().changes_since(version) {
        ctx.out.push_str(&format!("cpos: {pos}\nId: {}\n", song.id));
    }
    Ok(Reply::Ok)
}

fn playlistfind(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    for (pos, song) in ctx.engine.playlist().find(&args[0], &args[1], true) {
        write_song(ctx.out, pos, song);
    }
    Ok(Reply::Ok)
}

fn playlistsearch(ctx: &mut Context<'_>, args: &[String]) -> Result<Reply, Ack> {
    for (pos, song) in ctx.engine.playlist().find(&args[0], &args[1], false) {
        write_song(ctx.out, pos, song);
    }
    Ok(Reply::Ok)
}

fn currentsong(ctx: &mut Context<'_>, _args: &[String]) -> Result<Reply, Ack> {
    let playlist = ctx.engine.playlist();
    if let Some(song) = ctx.engine.current_song() {
        if let Some(pos) = playlist.position_of(song.id) {
            write_song(ctx.out, pos, song);
        }
    }
    Ok(Reply::Ok)
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::Fixture;
    use mpd_proto::AckCode;

    fn files(lines: &[String]) -> Vec<&str> {
        lines
            .iter()
            .filter_map(|l| l.strip_prefix("file: "))
            .collect()
    }

    #[test]
    fn addid_reports_ids_and_positions() {
        let mut fx = Fixture::new();
        assert_eq!(fx.ok("addid /tmp/a.mp3"), vec!["Id: 1"]);
        assert_eq!(fx.ok("addid /tmp/b.mp3 0"), vec!["Id: 2"]);
        let info = fx.ok("playlistinfo");
        assert_eq!(files(&info), vec!["file:///tmp/b.mp3", "file:///tmp/a.mp3"]);
        assert!(info.contains(&"Pos: 1".to_string()));
        assert!(info.contains(&"Id: 1".to_string()));

        assert_eq!(fx.ack("add \"\"").message, "Malformed URI");
        assert_eq!(fx.ack("add /tmp/c.mp3 9").message, "Bad song index");
    }

    #[test]
    fn delete_by_position_range_id_and_search() {
        let mut fx = Fixture::new();
        for name in ["a", "b", "c", "d", "e"] {
            fx.ok(&format!("add /tmp/{name}.mp3"));
        }
        fx.ok("delete 0");
        fx.ok("delete 1:3");
        assert_eq!(
            files(&fx.ok("playlistinfo")),
            vec!["file:///tmp/b.mp3", "file:///tmp/e.mp3"]
        );
        fx.ok("deleteid 2");
        fx.ok("delete /tmp/e.mp3");
        assert!(fx.ok("playlistinfo").is_empty());

        assert_eq!(fx.ack("deleteid 2").code, AckCode::NoExist);
        assert_eq!(fx.ack("delete 0").message, "Bad song index");
        assert_eq!(fx.ack("delete nothing-here").code, AckCode::NoExist);
    }

    #[test]
    fn move_and_moveid() {
        let mut fx = Fixture::new();
        for name in ["a", "b", "c"] {
            fx.ok(&format!("add /tmp/{name}.mp3"));
        }
        fx.ok("move 0 2");
        assert_eq!(
            files(&fx.ok("playlistinfo")),
            vec!["file:///tmp/b.mp3", "file:///tmp/c.mp3", "file:///tmp/a.mp3"]
        );
        fx.ok("moveid 3 0");
        assert_eq!(
            files(&fx.ok("playlistinfo")),
            vec!["file:///tmp/c.mp3", "file:///tmp/b.mp3", "file:///tmp/a.mp3"]
        );
        assert_eq!(fx.ack("moveid 9 0").code, AckCode::NoExist);
    }

    #[test]
    fn playlistinfo_and_playlistid_selection() {
        let mut fx = Fixture::new();
        for name in ["a", "b", "c"] {
            fx.ok(&format!("add /tmp/{name}.mp3"));
        }
        assert_eq!(files(&fx.ok("playlistinfo 1")), vec!["file:///tmp/b.mp3"]);
        assert_eq!(files(&fx.ok("playlistinfo 1:")).len(), 2);
        assert_eq!(files(&fx.ok("playlistid 3")), vec!["file:///tmp/c.mp3"]);
        assert_eq!(files(&fx.ok("playlistid")).len(), 3);
        assert_eq!(fx.ack("playlistid 7").code, AckCode::NoExist);
        assert_eq!(fx.ack("playlistinfo 3").message, "Bad song index");
    }

    #[test]
    fn oversized_indices_are_rejected() {
        let mut fx = Fixture::new();
        fx.ok("add /tmp/a.mp3");
        let max = usize::MAX;

        let ack = fx.ack(&format!("delete {max}"));
        assert_eq!(ack.code, AckCode::Arg);
        assert_eq!(ack.to_line(), "ACK [2@0] {delete} Bad song index\n");
        assert_eq!(fx.ack(&format!("playlistinfo {max}")).message, "Bad song index");
        assert_eq!(fx.ack(&format!("move {max} 0")).code, AckCode::Arg);
        assert_eq!(fx.ack("delete 99999999999999999999999").code, AckCode::Arg);
        assert_eq!(fx.ack("move 0 4294967295").code, AckCode::Arg);
        assert_eq!(files(&fx.ok("playlistinfo")), vec!["file:///tmp/a.mp3"]);
    }

    #[test]
    fn plchanges_lists_only_newer_entries() {
        let mut fx = Fixture::new();
        fx.ok("add /tmp/a.mp3");
        let version: u64 = fx.field("status", "playlist").unwrap().parse().unwrap();
        fx.ok("add /tmp/b.mp3");
        assert_eq!(
            files(&fx.ok(&format!("plchanges {version}"))),
            vec!["file:///tmp/b.mp3"]
        );
        assert_eq!(
            fx.ok(&format!("plchangesposid {version}")),
            vec!["cpos: 1", "Id: 2"]
        );
        assert_eq!(files(&fx.ok("plchanges -1")).len(), 2);
    }

    #[test]
    fn find_and_search_match_tags() {
        let mut fx = Fixture::new();
        fx.ok("add /tmp/Blue.mp3");
        fx.ok("add /tmp/red.mp3");
        assert_eq!(files(&fx.ok("playlistfind file file:///tmp/red.mp3")).len(), 1);
        assert!(fx.ok("playlistfind file red").is_empty());
        assert_eq!(
            files(&fx.ok("playlistsearch file blue")),
            vec!["file:///tmp/Blue.mp3"]
        );
        assert_eq!(files(&fx.ok("playlistsearch any MP3")).len(), 2);
    }

    #[test]
    fn currentsong_follows_playback() {
        let mut fx = Fixture::new();
        fx.ok("add /tmp/a.mp3");
        fx.ok("add /tmp/b.mp3");
        assert!(fx.ok("currentsong").is_empty());
        fx.ok("play 1");
        let current = fx.ok("currentsong");
        assert_eq!(files(&current), vec!["file:///tmp/b.mp3"]);
        assert!(current.contains(&"Pos: 1".to_string()));
        fx.ok("clear");
        assert!(fx.ok("currentsong").is_empty());
        assert_eq!(fx.field("status", "state").as_deref(), Some("stop"));
    }
}

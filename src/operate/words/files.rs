use std::{collections::HashMap, fs, io, path::Path};

use walkdir::WalkDir;

use crate::{
    consts::{DELIMITER, VARIABLE_MARKER},
    error::Error,
    operate::{Binding, Context, Flow, Operate},
    package::{FileChunks, Package},
};

/// Runs a script from the script directory.
///
/// Non-blank lines accumulate into one command until a blank line (or the
/// end of the file) flushes it through the interpreter. A line starting
/// with `#` binds the rest of the line, as a name, to a value popped off the
/// caller's stack; a later line equal to that name is replaced by the value.
pub(super) fn run(op: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let name = ctx.pop_value()?;
    let path = op.script_dir.join(&name);

    let script = match fs::read_to_string(&path) {
        Ok(script) => script,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("run: no script at {}", path.display());
            return Ok(Flow::Stop);
        }
        Err(e) => {
            op.console.print_line(&format!("run {name}: {e}"));
            return Ok(Flow::Next);
        }
    };

    let mut variables = HashMap::new();
    let mut command = String::new();
    for line in script.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            flush(op, ctx, &mut command);
            continue;
        }
        if let Some(variable) = line.strip_prefix(VARIABLE_MARKER) {
            variables.insert(variable.to_string(), ctx.pop_value()?);
            continue;
        }

        let line = variables.get(line).map(String::as_str).unwrap_or(line);
        if !command.is_empty() {
            command.push(DELIMITER);
        }
        command.push_str(line);
    }
    flush(op, ctx, &mut command);

    Ok(Flow::Next)
}

fn flush(op: &Operate, ctx: &Context<'_>, command: &mut String) {
    if !command.is_empty() {
        op.process(command, ctx.package, ctx.binding);
        command.clear();
    }
}

/// Pushes the path of every regular file under the popped directory,
/// relative to it.
pub(super) fn tree(op: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let dir = ctx.pop_value()?;
    let root = Path::new(&dir);
    if !root.is_dir() {
        log::debug!("tree: no directory at {dir}");
        return Ok(Flow::Stop);
    }

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                op.console.print_line(&format!("tree {dir}: {e}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            ctx.push_value(relative.to_string_lossy());
        }
    }
    Ok(Flow::Next)
}

/// `sft`: streams a local file as chunk packages. On the hub the destination
/// is the next popped hostname; on a peer the file goes upstream.
pub(super) fn send_file(op: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let filename = ctx.pop_value()?;
    if !Path::new(&filename).is_file() {
        log::debug!("sft: no file at {filename}");
        return Ok(Flow::Stop);
    }

    let binding = ctx.binding;
    let send: Box<dyn Fn(Package) -> Result<(), Error> + '_> = match binding {
        Binding::Hub { server, .. } => {
            let hostname = ctx.pop_value()?;
            let Some(session) = server.find(&hostname) else {
                log::debug!("sft: no peer named {hostname}");
                return Ok(Flow::Next);
            };
            Box::new(move |package| session.send(package))
        }
        Binding::Peer(client) => Box::new(move |package| client.send(package)),
    };

    let transfer_id = op.next_transfer_id();
    let result = FileChunks::open(&filename, transfer_id)
        .and_then(|mut chunks| chunks.try_for_each(|chunk| send(chunk?)));
    match result {
        Ok(()) => log::info!("sent {filename} as transfer {transfer_id}"),
        Err(e) => op.console.print_line(&format!("sft {filename}: {e}")),
    }
    Ok(Flow::Next)
}

/// `popfs`: moves the oldest completed transfer to the popped path.
pub(super) fn pop_file(op: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let dest = ctx.pop_value()?;
    match op.staging.claim(Path::new(&dest)) {
        Ok(Some(path)) => log::info!("popfs: transfer moved to {}", path.display()),
        Ok(None) => op.console.print_line("popfs: no completed transfer staged"),
        Err(e) => op.console.print_line(&format!("popfs {dest}: {e}")),
    }
    Ok(Flow::Next)
}

use crate::{
    consts::{BEGIN, ELSE, END, IF, REPEAT, THEN},
    error::Error,
    operate::{Context, Flow, Operate},
};

// `<cond> if <true...> [else <false...>] then`
//
// Consumes everything up to the matching `then`, then puts back the branch
// picked by the condition. "0" is false, anything else is true.
pub(super) fn branch(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let mut on_true = Vec::new();
    let mut on_false = Vec::new();
    let mut in_else = false;
    let mut depth = 0usize;

    loop {
        let token = ctx.actions.pop().ok_or(Error::UnterminatedBlock(IF))?;
        match token.as_str() {
            THEN if depth == 0 => break,
            ELSE if depth == 0 => {
                in_else = true;
                continue;
            }
            IF => depth += 1,
            THEN => depth -= 1,
            _ => {}
        }
        if in_else {
            on_false.push(token);
        } else {
            on_true.push(token);
        }
    }

    let cond = ctx.pop_value()?;
    let taken = if cond == "0" { on_false } else { on_true };
    ctx.actions.extend(taken.into_iter().rev());
    Ok(Flow::Next)
}

// `begin <body...> end`
//
// Copies the body up to the matching `end` back on top, preceded by a
// `repeat` marker, so the body runs and then loops again. The span itself
// stays in place for the next iteration; only `exit` leaves the loop.
pub(super) fn begin(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let mut body = Vec::new();
    let mut depth = 0usize;
    let mut closed = false;

    for token in ctx.actions.iter().rev() {
        match token.as_str() {
            END if depth == 0 => {
                closed = true;
                break;
            }
            BEGIN => depth += 1,
            END => depth -= 1,
            _ => {}
        }
        body.push(token.clone());
    }
    if !closed {
        return Err(Error::UnterminatedBlock(BEGIN));
    }

    ctx.actions.push(REPEAT.to_string());
    ctx.actions.extend(body.into_iter().rev());
    Ok(Flow::Next)
}

// Drops pending tokens through the enclosing loop's `end`. Loops that have
// not started yet are skipped as a whole.
pub(super) fn exit(_: &Operate, ctx: &mut Context<'_>) -> Result<Flow, Error> {
    let mut depth = 0usize;
    while let Some(token) = ctx.actions.pop() {
        match token.as_str() {
            END if depth == 0 => break,
            BEGIN => depth += 1,
            END => depth -= 1,
            _ => {}
        }
    }
    Ok(Flow::Next)
}

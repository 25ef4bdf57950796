//! Line-framed directional pump
//!
//! Each relay direction is one pump: bytes in, CRLF-split lines through a
//! transform, CRLF-framed lines out. The transform is a plain closure from
//! line content to line content, so the two directions differ only in the
//! strategy passed here (AUTHINFO rewriting outbound, status normalization
//! inbound).

use std::borrow::Cow;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::protocol::CRLF;

/// Initial line buffer capacity. NNTP command and status lines are short;
/// payload lines may grow the buffer and it is reused across reads.
const LINE_CAPACITY: usize = 512;

/// Pump lines from `reader` to `writer` until EOF or an I/O error.
///
/// Lines are split on `\n`, handed to `transform` without their terminator
/// (`\r\n` or bare `\n`), and re-emitted with CRLF — so `\n`-only input is
/// normalized on the way through. A final unterminated fragment at stream
/// end is forwarded verbatim, bypassing the transform: it is not a complete
/// line and rewriting it could corrupt payload.
///
/// Returns the number of bytes written to `writer`. The caller owns write
/// shutdown; this function only flushes.
pub async fn pump_lines<R, W, F>(
    reader: R,
    writer: &mut W,
    mut transform: F,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: for<'a> FnMut(&'a [u8]) -> Cow<'a, [u8]>,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::with_capacity(LINE_CAPACITY);
    let mut written = 0u64;

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            break;
        }

        if line.last() != Some(&b'\n') {
            writer.write_all(&line).await?;
            written += line.len() as u64;
            break;
        }

        let content = strip_terminator(&line);
        let out = transform(content);
        writer.write_all(&out).await?;
        writer.write_all(CRLF).await?;
        written += out.len() as u64 + CRLF.len() as u64;
    }

    writer.flush().await?;
    Ok(written)
}

/// Drop the trailing `\r\n` or `\n` from a line known to end with `\n`.
fn strip_terminator(line: &[u8]) -> &[u8] {
    if line.ends_with(CRLF) {
        &line[..line.len() - 2]
    } else {
        &line[..line.len() - 1]
    }
}

//! Classic cross-reference table parsing.
//!
//! The table must be present and well-formed, but its offsets are
//! discarded: the object graph is rebuilt from the forward scan of the
//! file, which never lies about where objects actually are.

use crate::core::PdfError;
use crate::parser::lexer::{Lexer, TokenKind, is_whitespace};

/// Parse the subsections following an `xref` keyword, leaving the lexer
/// positioned on whatever comes next (normally `trailer`).
pub(crate) fn parse_xref_table(lexer: &mut Lexer<'_>) -> Result<(), PdfError> {
    loop {
        let save = lexer.pos();
        let Some(first) = lexer.next_token()? else {
            break;
        };
        if first.kind != TokenKind::Integer {
            lexer.seek(save);
            break;
        }

        let count_token = lexer
            .next_token()?
            .filter(|t| t.kind == TokenKind::Integer)
            .ok_or_else(|| PdfError::parse(lexer.pos(), "xref subsection needs a count"))?;
        let count: usize = std::str::from_utf8(count_token.raw)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| PdfError::parse(count_token.offset, "bad xref subsection count"))?;

        let buf = lexer.buf();
        let mut pos = lexer.pos();
        while pos < buf.len() && is_whitespace(buf[pos]) {
            pos += 1;
        }
        for _ in 0..count {
            let entry = buf
                .get(pos..pos + 20)
                .ok_or_else(|| PdfError::parse(pos, "truncated xref entry"))?;
            validate_entry(entry, pos)?;
            pos += 20;
        }
        lexer.seek(pos);
    }
    Ok(())
}

/// One 20-byte entry: `NNNNNNNNNN GGGGG n<eol>` or `… f<eol>`.
fn validate_entry(entry: &[u8], pos: usize) -> Result<(), PdfError> {
    let well_formed = entry[..10].iter().all(u8::is_ascii_digit)
        && entry[10] == b' '
        && entry[11..16].iter().all(u8::is_ascii_digit)
        && entry[16] == b' '
        && matches!(entry[17], b'n' | b'f')
        && entry[18..20]
            .iter()
            .all(|b| matches!(b, b' ' | b'\r' | b'\n'));
    if well_formed {
        Ok(())
    } else {
        Err(PdfError::parse(pos, "malformed xref entry"))
    }
}

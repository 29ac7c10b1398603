//! Minimal HTML segmentation used by the structure-aware locate strategy.
//!
//! The document is split into markup and character-data runs without building
//! a full tree; text runs correspond to the text-bearing leaves of the markup
//! tree in document order. Entity decoding keeps a map back to raw byte
//! offsets so a match inside decoded text can be patched in the raw document.

/// One run of character data between tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TextRun {
    /// Byte offset of the run start in the raw document.
    pub start: usize,
    /// Byte offset one past the run end.
    pub end: usize,
}

/// Returns the text runs of `document` in document order.
///
/// Comments (`<!-- -->`) are treated as markup. A document without any tags
/// is one single run.
pub(crate) fn text_runs(document: &str) -> Vec<TextRun> {
    let bytes = document.as_bytes();
    let mut runs = Vec::new();
    let mut run_start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            if i > run_start {
                runs.push(TextRun {
                    start: run_start,
                    end: i,
                });
            }
            i = skip_markup(document, i);
            run_start = i;
        } else {
            i += 1;
        }
    }
    if run_start < bytes.len() {
        runs.push(TextRun {
            start: run_start,
            end: bytes.len(),
        });
    }
    runs
}

fn skip_markup(document: &str, start: usize) -> usize {
    let rest = &document[start..];
    if rest.starts_with("<!--") {
        return match rest.find("-->") {
            Some(idx) => start + idx + 3,
            None => document.len(),
        };
    }
    match rest.find('>') {
        Some(idx) => start + idx + 1,
        None => document.len(),
    }
}

/// Entity-decoded view of one text run.
#[derive(Debug)]
pub(crate) struct DecodedRun {
    /// Decoded character data.
    pub text: String,
    /// Per decoded char: (byte offset in `text`, raw start, raw end).
    map: Vec<(usize, usize, usize)>,
    raw_end: usize,
}

impl DecodedRun {
    /// Maps a byte range of the decoded text back to raw document offsets.
    ///
    /// `dstart`/`dend` must lie on decoded char boundaries (as produced by
    /// `str::find` against `text`).
    pub fn raw_range(&self, dstart: usize, dend: usize) -> (usize, usize) {
        let mut raw_start = self.raw_end;
        let mut raw_stop = self.raw_end;
        for &(decoded_at, raw_at, raw_after) in &self.map {
            if decoded_at == dstart {
                raw_start = raw_at;
            }
            if decoded_at < dend {
                raw_stop = raw_after;
            }
        }
        (raw_start, raw_stop)
    }
}

/// Decodes the entities of one text run located at `base` in the raw document.
pub(crate) fn decode_run(raw: &str, base: usize) -> DecodedRun {
    let mut text = String::with_capacity(raw.len());
    let mut map = Vec::new();
    let mut iter = raw.char_indices().peekable();
    while let Some((at, ch)) = iter.next() {
        if ch == '&'
            && let Some((decoded, entity_len)) = decode_entity(&raw[at..])
        {
            map.push((text.len(), base + at, base + at + entity_len));
            text.push(decoded);
            // consume the remaining entity bytes
            while let Some(&(next_at, _)) = iter.peek() {
                if next_at < at + entity_len {
                    iter.next();
                } else {
                    break;
                }
            }
            continue;
        }
        map.push((text.len(), base + at, base + at + ch.len_utf8()));
        text.push(ch);
    }
    DecodedRun {
        text,
        map,
        raw_end: base + raw.len(),
    }
}

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&apos;", '\''),
    ("&nbsp;", '\u{a0}'),
    ("&ndash;", '\u{2013}'),
    ("&mdash;", '\u{2014}'),
    ("&hellip;", '\u{2026}'),
    ("&lsquo;", '\u{2018}'),
    ("&rsquo;", '\u{2019}'),
    ("&ldquo;", '\u{201c}'),
    ("&rdquo;", '\u{201d}'),
];

fn decode_entity(rest: &str) -> Option<(char, usize)> {
    for (name, decoded) in NAMED_ENTITIES {
        if rest.starts_with(name) {
            return Some((*decoded, name.len()));
        }
    }
    let body = rest.strip_prefix("&#")?;
    let semi = body.find(';').filter(|&idx| idx > 0 && idx <= 8)?;
    let digits = &body[..semi];
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    let decoded = char::from_u32(code)?;
    Some((decoded, 2 + semi + 1))
}

//! Rescaling of literal initial camera placements.

const CAMERA_CALL: &str = "camera.position.set(";

/// Multiply every literal argument of every `camera.position.set(a, b, c)` call
/// by `factor`.
///
/// Only calls whose three arguments are all numeric literals are touched.
/// Separators, whitespace and surrounding text are preserved.
pub fn rescale_initial_camera(document: &str, factor: f64) -> String {
    let mut out = String::with_capacity(document.len());
    let mut cursor = 0;

    while let Some(found) = document[cursor..].find(CAMERA_CALL) {
        let args_start = cursor + found + CAMERA_CALL.len();
        out.push_str(&document[cursor..args_start]);

        match parse_literal_args(&document[args_start..]) {
            Some(call) => {
                let args = &document[args_start..args_start + call.len];
                let mut last = 0;
                for span in &call.literals {
                    out.push_str(&args[last..span.start]);
                    out.push_str(&format_number(span.value * factor));
                    last = span.end;
                }
                out.push_str(&args[last..]);
                cursor = args_start + call.len;
            }
            None => cursor = args_start,
        }
    }

    out.push_str(&document[cursor..]);
    out
}

struct LiteralSpan {
    start: usize,
    end: usize,
    value: f64,
}

struct LiteralCall {
    literals: Vec<LiteralSpan>,
    /// Length of the argument text including the closing parenthesis.
    len: usize,
}

fn parse_literal_args(text: &str) -> Option<LiteralCall> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    let mut literals = Vec::with_capacity(3);

    for index in 0..3 {
        pos = skip_whitespace(bytes, pos);
        let (end, value) = scan_number(text, pos)?;
        literals.push(LiteralSpan { start: pos, end, value });
        pos = skip_whitespace(bytes, end);

        let expected = if index < 2 { b',' } else { b')' };
        if bytes.get(pos) != Some(&expected) {
            return None;
        }
        pos += 1;
    }

    Some(LiteralCall { literals, len: pos })
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).map(|b| b.is_ascii_whitespace()).unwrap_or(false) {
        pos += 1;
    }
    pos
}

/// Scan `-?(digits[.digits] | .digits)` starting at `start`.
fn scan_number(text: &str, start: usize) -> Option<(usize, f64)> {
    let bytes = text.as_bytes();
    let mut pos = start;

    if bytes.get(pos) == Some(&b'-') {
        pos += 1;
    }

    let int_start = pos;
    while bytes.get(pos).map(u8::is_ascii_digit).unwrap_or(false) {
        pos += 1;
    }
    let mut digits = pos - int_start;

    if bytes.get(pos) == Some(&b'.') {
        let frac_start = pos + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).map(u8::is_ascii_digit).unwrap_or(false) {
            frac_end += 1;
        }
        if frac_end > frac_start {
            digits += frac_end - frac_start;
            pos = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    text[start..pos].parse::<f64>().ok().map(|value| (pos, value))
}

/// Shortest decimal form; negative zero prints as `0`.
pub(crate) fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value)
}

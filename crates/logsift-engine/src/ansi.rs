//! ANSI escape stripping for colored log output (`\x1b[31mERROR\x1b[0m`).

use std::borrow::Cow;

const ESC: char = '\x1b';
const BEL: char = '\x07';

/// Remove CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL|ESC \`) and two-char
/// escape sequences. Borrows when the line has no ESC.
pub fn strip_ansi(line: &str) -> Cow<'_, str> {
    if !line.contains(ESC) {
        return Cow::Borrowed(line);
    }

    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c != ESC {
            out.push(c);
            continue;
        }

        match chars.peek().copied() {
            Some('[') => {
                chars.next();
                // parameters run until a final byte in 0x40..=0x7E
                for b in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&b) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(b) = chars.next() {
                    if b == BEL {
                        break;
                    }
                    if b == ESC && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            Some(next) if ('\x40'..='\x5f').contains(&next) => {
                chars.next();
            }
            // lone ESC
            _ => {}
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_is_borrowed() {
        assert!(matches!(strip_ansi("INFO ready"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_color_codes() {
        assert_eq!(
            strip_ansi("\x1b[1;31mERROR\x1b[0m disk full"),
            "ERROR disk full"
        );
    }

    #[test]
    fn test_strip_osc_hyperlink() {
        let line = "see \x1b]8;;http://x\x07docs\x1b]8;;\x1b\\ now";
        assert_eq!(strip_ansi(line), "see docs now");
    }

    #[test]
    fn test_trailing_lone_escape() {
        assert_eq!(strip_ansi("WARN slow\x1b"), "WARN slow");
    }
}

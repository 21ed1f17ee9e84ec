//! Named Android key codes.
//!
//! Only the keys automation scripts commonly press are named here; any other
//! code from `android.view.KeyEvent` can still be sent as a number.

pub const HOME: i32 = 3;
pub const BACK: i32 = 4;
pub const VOLUME_UP: i32 = 24;
pub const VOLUME_DOWN: i32 = 25;
pub const POWER: i32 = 26;
pub const ENTER: i32 = 66;
pub const DELETE: i32 = 67;
pub const MENU: i32 = 82;

/// Every named key, as `(name, code)`.
pub const NAMED: &[(&str, i32)] = &[
    ("HOME", HOME),
    ("BACK", BACK),
    ("VOLUME_UP", VOLUME_UP),
    ("VOLUME_DOWN", VOLUME_DOWN),
    ("POWER", POWER),
    ("ENTER", ENTER),
    ("DELETE", DELETE),
    ("MENU", MENU),
];

/// Looks up a key by name (case-insensitive, `-` or `_` separated) or parses
/// a decimal key code.
pub fn parse(input: &str) -> Option<i32> {
    let input = input.trim();
    if let Ok(code) = input.parse::<i32>() {
        return Some(code);
    }
    let normalized = input.replace('-', "_");
    NAMED
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(&normalized))
        .map(|&(_, code)| code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!(parse("back"), Some(BACK));
        assert_eq!(parse("HOME"), Some(3));
        assert_eq!(parse("volume-up"), Some(24));
        assert_eq!(parse("Volume_Down"), Some(25));
        assert_eq!(parse("enter"), Some(66));
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse("4"), Some(4));
        assert_eq!(parse(" 187 "), Some(187));
        assert_eq!(parse("-1"), Some(-1));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(parse("launch-missiles"), None);
        assert_eq!(parse(""), None);
    }
}

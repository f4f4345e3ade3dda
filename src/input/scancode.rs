//! PC AT set 1 scancodes.

use super::tokens::{SpecialKey, Token};
use super::{InputError, KeyEncoding, KeyEvent};

const LEFT_SHIFT: u32 = 0x2a;
const RELEASE_BIT: u8 = 0x80;
const EXTENDED_PREFIX: u8 = 0xe0;

/// Rows of the US layout, each paired with the scancode of its first key.
/// The shifted row shares codes with its unshifted twin.
const ROWS: [(&str, &str, u32); 4] = [
    ("1234567890-=", "!@#$%^&*()_+", 0x02),
    ("qwertyuiop[]", "QWERTYUIOP{}", 0x10),
    ("asdfghjkl;'`", "ASDFGHJKL:\"~", 0x1e),
    ("\\zxcvbnm,./", "|ZXCVBNM<>?", 0x2b),
];

pub fn encode(token: &Token) -> Result<Vec<KeyEvent>, InputError> {
    match token {
        Token::Char(ch) => encode_char(*ch),
        Token::Special(key) => Ok(tap(special_code(*key))),
        Token::Wait(_) => Ok(Vec::new()),
    }
}

fn encode_char(ch: char) -> Result<Vec<KeyEvent>, InputError> {
    if ch == ' ' {
        return Ok(tap(0x39));
    }
    for (plain, shifted, first) in ROWS {
        if let Some(offset) = plain.chars().position(|c| c == ch) {
            return Ok(tap(first + offset as u32));
        }
        if let Some(offset) = shifted.chars().position(|c| c == ch) {
            let mut events = vec![KeyEvent::press(LEFT_SHIFT)];
            events.extend(tap(first + offset as u32));
            events.push(KeyEvent::release(LEFT_SHIFT));
            return Ok(events);
        }
    }
    Err(InputError::UnsupportedCharacter {
        ch,
        encoding: KeyEncoding::Scancode,
    })
}

fn special_code(key: SpecialKey) -> u32 {
    match key {
        SpecialKey::Enter => 0x1c,
        SpecialKey::Escape => 0x01,
        SpecialKey::Backspace => 0x0e,
        SpecialKey::Tab => 0x0f,
        SpecialKey::Space => 0x39,
        SpecialKey::Function(n @ 1..=10) => 0x3a + u32::from(n),
        SpecialKey::Function(11) => 0x57,
        SpecialKey::Function(_) => 0x58,
        SpecialKey::Delete => 0xe053,
        SpecialKey::Up => 0xe048,
        SpecialKey::Down => 0xe050,
        SpecialKey::Left => 0xe04b,
        SpecialKey::Right => 0xe04d,
        SpecialKey::Insert => 0xe052,
        SpecialKey::Home => 0xe047,
        SpecialKey::End => 0xe04f,
        SpecialKey::PageUp => 0xe049,
        SpecialKey::PageDown => 0xe051,
    }
}

fn tap(code: u32) -> Vec<KeyEvent> {
    vec![KeyEvent::press(code), KeyEvent::release(code)]
}

/// Wire bytes for one event: break codes set the high bit, extended keys
/// are prefixed with `0xe0`.
pub fn event_bytes(event: KeyEvent) -> Vec<u8> {
    let low = (event.code & 0xff) as u8;
    let byte = if event.pressed { low } else { low | RELEASE_BIT };
    if event.code > 0xff {
        vec![EXTENDED_PREFIX, byte]
    } else {
        vec![byte]
    }
}

/// Hex form accepted by `VBoxManage controlvm ... keyboardputscancode`.
pub fn event_hex(event: KeyEvent) -> Vec<String> {
    event_bytes(event)
        .into_iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

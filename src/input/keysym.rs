//! X11 keysyms for RFB `KeyEvent` messages.

use super::tokens::{SpecialKey, Token};
use super::{InputError, KeyEncoding, KeyEvent};

const XK_SHIFT_L: u32 = 0xffe1;
const SHIFTED_SYMBOLS: &str = "~!@#$%^&*()_+{}|:\"<>?";
const UNICODE_KEYSYM_BASE: u32 = 0x0100_0000;

pub fn encode(token: &Token) -> Result<Vec<KeyEvent>, InputError> {
    match token {
        Token::Char(ch) => encode_char(*ch),
        Token::Special(key) => Ok(tap(special_keysym(*key))),
        Token::Wait(_) => Ok(Vec::new()),
    }
}

fn encode_char(ch: char) -> Result<Vec<KeyEvent>, InputError> {
    let code = u32::from(ch);
    let keysym = match code {
        0x20..=0x7e | 0xa0..=0xff => code,
        0x100.. if !ch.is_control() => UNICODE_KEYSYM_BASE | code,
        _ => {
            return Err(InputError::UnsupportedCharacter {
                ch,
                encoding: KeyEncoding::Keysym,
            })
        }
    };

    if ch.is_uppercase() || SHIFTED_SYMBOLS.contains(ch) {
        let mut events = vec![KeyEvent::press(XK_SHIFT_L)];
        events.extend(tap(keysym));
        events.push(KeyEvent::release(XK_SHIFT_L));
        return Ok(events);
    }
    Ok(tap(keysym))
}

fn special_keysym(key: SpecialKey) -> u32 {
    match key {
        SpecialKey::Enter => 0xff0d,
        SpecialKey::Escape => 0xff1b,
        SpecialKey::Backspace => 0xff08,
        SpecialKey::Delete => 0xffff,
        SpecialKey::Tab => 0xff09,
        SpecialKey::Space => 0x20,
        SpecialKey::Function(n) => 0xffbd + u32::from(n),
        SpecialKey::Up => 0xff52,
        SpecialKey::Down => 0xff54,
        SpecialKey::Left => 0xff51,
        SpecialKey::Right => 0xff53,
        SpecialKey::Insert => 0xff63,
        SpecialKey::Home => 0xff50,
        SpecialKey::End => 0xff57,
        SpecialKey::PageUp => 0xff55,
        SpecialKey::PageDown => 0xff56,
    }
}

fn tap(code: u32) -> Vec<KeyEvent> {
    vec![KeyEvent::press(code), KeyEvent::release(code)]
}

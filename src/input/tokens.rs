#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitLength {
    Short,
    Medium,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKey {
    Enter,
    Escape,
    Backspace,
    Delete,
    Tab,
    Space,
    Function(u8),
    Up,
    Down,
    Left,
    Right,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Char(char),
    Special(SpecialKey),
    Wait(WaitLength),
}

impl Token {
    pub fn is_wait(&self) -> bool {
        matches!(self, Self::Wait(_))
    }
}

enum Run<'a> {
    Word(&'a str),
    Space(&'a str),
}

/// Splits rendered command text into tokens.
///
/// Angle-bracket names (`<enter>`, `<f5>`, `<wait10>`, ...) become special
/// keys or waits. A whitespace-delimited bare `wait`, `wait5` or `wait10`
/// word is a wait directive and swallows the whitespace on both sides of it.
/// Everything else is typed character by character.
pub fn tokenize(text: &str) -> Vec<Token> {
    let runs = split_runs(text);
    let mut absorbed = vec![false; runs.len()];
    for (index, run) in runs.iter().enumerate() {
        if let Run::Word(word) = run {
            if bare_wait(word).is_some() {
                if index > 0 {
                    absorbed[index - 1] = true;
                }
                if index + 1 < runs.len() {
                    absorbed[index + 1] = true;
                }
            }
        }
    }

    let mut tokens = Vec::new();
    for (index, run) in runs.iter().enumerate() {
        match run {
            Run::Space(_) if absorbed[index] => {}
            Run::Space(space) => push_whitespace(space, &mut tokens),
            Run::Word(word) => match bare_wait(word) {
                Some(length) => tokens.push(Token::Wait(length)),
                None => push_word(word, &mut tokens),
            },
        }
    }
    tokens
}

fn split_runs(text: &str) -> Vec<Run<'_>> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut in_space = None;
    for (offset, ch) in text.char_indices() {
        let is_space = ch.is_whitespace();
        match in_space {
            Some(previous) if previous != is_space => {
                runs.push(make_run(&text[start..offset], previous));
                start = offset;
            }
            _ => {}
        }
        in_space = Some(is_space);
    }
    if let Some(previous) = in_space {
        runs.push(make_run(&text[start..], previous));
    }
    runs
}

fn make_run(slice: &str, is_space: bool) -> Run<'_> {
    if is_space {
        Run::Space(slice)
    } else {
        Run::Word(slice)
    }
}

fn bare_wait(word: &str) -> Option<WaitLength> {
    match word {
        "wait" => Some(WaitLength::Short),
        "wait5" => Some(WaitLength::Medium),
        "wait10" => Some(WaitLength::Long),
        _ => None,
    }
}

fn push_whitespace(space: &str, tokens: &mut Vec<Token>) {
    let mut chars = space.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' if chars.peek() == Some(&'\n') => {}
            '\r' | '\n' => tokens.push(Token::Special(SpecialKey::Enter)),
            '\t' => tokens.push(Token::Special(SpecialKey::Tab)),
            other => tokens.push(Token::Char(other)),
        }
    }
}

fn push_word(word: &str, tokens: &mut Vec<Token>) {
    let mut rest = word;
    while let Some(ch) = rest.chars().next() {
        if ch == '<' {
            if let Some(close) = rest.find('>') {
                if let Some(token) = angle_token(&rest[1..close]) {
                    tokens.push(token);
                    rest = &rest[close + 1..];
                    continue;
                }
            }
        }
        tokens.push(Token::Char(ch));
        rest = &rest[ch.len_utf8()..];
    }
}

fn angle_token(name: &str) -> Option<Token> {
    let lower = name.to_ascii_lowercase();
    let special = match lower.as_str() {
        "wait" => return Some(Token::Wait(WaitLength::Short)),
        "wait5" => return Some(Token::Wait(WaitLength::Medium)),
        "wait10" => return Some(Token::Wait(WaitLength::Long)),
        "enter" | "return" => SpecialKey::Enter,
        "esc" => SpecialKey::Escape,
        "bs" => SpecialKey::Backspace,
        "del" => SpecialKey::Delete,
        "tab" => SpecialKey::Tab,
        "spacebar" => SpecialKey::Space,
        "up" => SpecialKey::Up,
        "down" => SpecialKey::Down,
        "left" => SpecialKey::Left,
        "right" => SpecialKey::Right,
        "insert" => SpecialKey::Insert,
        "home" => SpecialKey::Home,
        "end" => SpecialKey::End,
        "pageup" => SpecialKey::PageUp,
        "pagedown" => SpecialKey::PageDown,
        other => {
            let number = other.strip_prefix('f')?.parse::<u8>().ok()?;
            if !(1..=12).contains(&number) {
                return None;
            }
            SpecialKey::Function(number)
        }
    };
    Some(Token::Special(special))
}

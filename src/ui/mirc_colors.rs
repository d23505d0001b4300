use crossterm::style::{Attribute, Color, ContentStyle, StyledContent};

/// mIRC 16-color palette
const MIRC_PALETTE: [Color; 16] = [
    Color::Rgb { r: 255, g: 255, b: 255 }, // 0  White
    Color::Rgb { r: 0, g: 0, b: 0 },       // 1  Black
    Color::Rgb { r: 0, g: 0, b: 127 },     // 2  Dark Blue
    Color::Rgb { r: 0, g: 147, b: 0 },     // 3  Dark Green
    Color::Rgb { r: 255, g: 0, b: 0 },     // 4  Red
    Color::Rgb { r: 127, g: 0, b: 0 },     // 5  Dark Red
    Color::Rgb { r: 156, g: 0, b: 156 },   // 6  Purple
    Color::Rgb { r: 252, g: 127, b: 0 },   // 7  Orange
    Color::Rgb { r: 255, g: 255, b: 0 },   // 8  Yellow
    Color::Rgb { r: 0, g: 252, b: 0 },     // 9  Light Green
    Color::Rgb { r: 0, g: 147, b: 147 },   // 10 Teal
    Color::Rgb { r: 0, g: 255, b: 255 },   // 11 Light Cyan
    Color::Rgb { r: 0, g: 0, b: 252 },     // 12 Light Blue
    Color::Rgb { r: 255, g: 0, b: 255 },   // 13 Pink
    Color::Rgb { r: 127, g: 127, b: 127 }, // 14 Dark Gray
    Color::Rgb { r: 210, g: 210, b: 210 }, // 15 Light Gray
];

const BOLD: char = '\x02';
const COLOR: char = '\x03';
const RESET: char = '\x0f';
const REVERSE: char = '\x16';
const ITALIC: char = '\x1d';
const UNDERLINE: char = '\x1f';

/// Split mIRC-formatted text into styled segments.
pub fn parse_mirc_formatted(text: &str, base_style: ContentStyle) -> Vec<StyledContent<String>> {
    let mut spans = Vec::new();
    let mut style = base_style;
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if matches!(c, BOLD | COLOR | RESET | REVERSE | ITALIC | UNDERLINE) && !current.is_empty() {
            spans.push(StyledContent::new(style, std::mem::take(&mut current)));
        }
        match c {
            BOLD => toggle(&mut style, Attribute::Bold),
            ITALIC => toggle(&mut style, Attribute::Italic),
            UNDERLINE => toggle(&mut style, Attribute::Underlined),
            RESET => style = base_style,
            REVERSE => {
                let fg = style.foreground_color;
                style.foreground_color = style.background_color;
                style.background_color = fg;
            }
            COLOR => match take_color(&mut chars) {
                Some(fg) => {
                    if let Some(color) = MIRC_PALETTE.get(fg) {
                        style.foreground_color = Some(*color);
                    }
                    if chars.peek() == Some(&',') {
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        if let Some(bg) = take_color(&mut lookahead) {
                            if let Some(color) = MIRC_PALETTE.get(bg) {
                                style.background_color = Some(*color);
                            }
                            chars = lookahead;
                        }
                    }
                }
                // Bare \x03 resets colors
                None => {
                    style.foreground_color = base_style.foreground_color;
                    style.background_color = base_style.background_color;
                }
            },
            _ => current.push(c),
        }
    }

    if !current.is_empty() || spans.is_empty() {
        spans.push(StyledContent::new(style, current));
    }
    spans
}

/// Text with every formatting code removed.
pub fn strip_formatting(text: &str) -> String {
    parse_mirc_formatted(text, ContentStyle::default())
        .into_iter()
        .map(|span| span.content().clone())
        .collect()
}

fn toggle(style: &mut ContentStyle, attribute: Attribute) {
    if style.attributes.has(attribute) {
        style.attributes.unset(attribute);
    } else {
        style.attributes.set(attribute);
    }
}

/// One or two digits naming a colour. Codes past the palette are consumed
/// but ignored.
fn take_color(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut value: Option<usize> = None;
    for _ in 0..2 {
        match chars.peek().and_then(|c| c.to_digit(10)) {
            Some(d) => {
                value = Some(value.unwrap_or(0) * 10 + d as usize);
                chars.next();
            }
            None => break,
        }
    }
    value
}

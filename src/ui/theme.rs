use crossterm::style::{Attribute, Color, ContentStyle};

pub struct Theme;

fn fg(color: Color) -> ContentStyle {
    ContentStyle {
        foreground_color: Some(color),
        ..ContentStyle::default()
    }
}

fn bold(color: Color) -> ContentStyle {
    let mut style = fg(color);
    style.attributes.set(Attribute::Bold);
    style
}

impl Theme {
    pub fn timestamp() -> ContentStyle {
        fg(Color::DarkGrey)
    }

    pub fn channel() -> ContentStyle {
        fg(Color::Blue)
    }

    pub fn nick_self() -> ContentStyle {
        bold(Color::Green)
    }

    pub fn nick_other() -> ContentStyle {
        fg(Color::Cyan)
    }

    pub fn message_text() -> ContentStyle {
        ContentStyle::default()
    }

    pub fn notice() -> ContentStyle {
        fg(Color::DarkCyan)
    }

    pub fn system_message() -> ContentStyle {
        fg(Color::Yellow)
    }

    pub fn error_message() -> ContentStyle {
        bold(Color::Red)
    }

    pub fn action_message() -> ContentStyle {
        fg(Color::Magenta)
    }

    pub fn join_message() -> ContentStyle {
        fg(Color::Green)
    }

    pub fn part_message() -> ContentStyle {
        fg(Color::DarkRed)
    }

    pub fn server_message() -> ContentStyle {
        fg(Color::Grey)
    }
}

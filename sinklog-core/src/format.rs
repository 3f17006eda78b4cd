use colored::Colorize;

use crate::event::Event;

/// Renders a console line: `HH:MM:SS LEVEL FILE:LINE: MESSAGE`.
pub fn format_console(event: &mut Event<'_>, color: bool) -> String {
    let time = event.timestamp().format("%H:%M:%S");
    let Event {
        level,
        file,
        line,
        args,
        ..
    } = *event;
    if color {
        let location = format!("{file}:{line}:").bright_black();
        format!("{time} {} {location} {args}", level.colored_label())
    } else {
        format!("{time} {level:<5} {file}:{line}: {args}")
    }
}

/// Renders a file line: `YYYY-MM-DD HH:MM:SS LEVEL FILE:LINE: MESSAGE`.
pub fn format_file(event: &mut Event<'_>) -> String {
    let time = event.timestamp().format("%Y-%m-%d %H:%M:%S");
    format!(
        "{time} {:<5} {}:{}: {}",
        event.level, event.file, event.line, event.args
    )
}

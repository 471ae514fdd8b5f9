//! Line commands typed while a track plays.

/// One parsed console command.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Command {
    Toggle,
    Stop,
    Seek(f64),
    Volume(f32),
    Speed(f32),
    Pitch(f32),
    Reverb(f32),
    EqLow(f32),
    EqMid(f32),
    EqHigh(f32),
    Quit,
}

pub const HELP: &str = "commands: p (play/pause), s (stop), seek <s>, vol <0..1>, speed <0.5..2>, \
pitch <-12..12>, reverb <0..1>, low|mid|high <dB>, q (quit)";

/// Parse a console line. `None` for blank or unknown input.
pub fn parse(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let verb = words.next()?.to_ascii_lowercase();
    let arg = words.next();
    let num = || arg.and_then(|a| a.parse::<f32>().ok());
    let cmd = match verb.as_str() {
        "p" | "play" | "pause" => Command::Toggle,
        "s" | "stop" => Command::Stop,
        "q" | "quit" | "exit" => Command::Quit,
        "seek" => Command::Seek(arg?.parse().ok()?),
        "vol" | "volume" => Command::Volume(num()?),
        "speed" => Command::Speed(num()?),
        "pitch" => Command::Pitch(num()?),
        "reverb" | "mix" => Command::Reverb(num()?),
        "low" => Command::EqLow(num()?),
        "mid" => Command::EqMid(num()?),
        "high" => Command::EqHigh(num()?),
        _ => return None,
    };
    Some(cmd)
}

/// `m:ss` with whole seconds truncated.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds as u64 } else { 0 };
    format!("{}:{:02}", total / 60, total % 60)
}

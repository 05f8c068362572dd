use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
pub static SATELLITE: Emoji<'_, '_> = Emoji("📡 ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_banner() {
    println!(
        "\n{} {}  {}\n",
        SATELLITE,
        style("iceout-relay").bold().cyan(),
        style("new incident reports, straight to your channel").dim()
    );
}

enum GuideLine {
    Command(String, String),
    Status(String, String),
}

/// A titled block of aligned command or status lines.
pub struct GuideSection {
    title: String,
    lines: Vec<GuideLine>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn command(mut self, name: &str, description: &str) -> Self {
        self.lines
            .push(GuideLine::Command(name.to_string(), description.to_string()));
        self
    }

    pub fn status(mut self, label: &str, value: &str) -> Self {
        self.lines
            .push(GuideLine::Status(label.to_string(), value.to_string()));
        self
    }

    pub fn print(self) {
        println!("{}", style(&self.title).bold().underlined());
        let width = self
            .lines
            .iter()
            .map(|line| match line {
                GuideLine::Command(name, _) | GuideLine::Status(name, _) => name.chars().count(),
            })
            .max()
            .unwrap_or(0);
        for line in &self.lines {
            match line {
                GuideLine::Command(name, description) => println!(
                    "  {:<width$}  {}",
                    style(name).green(),
                    description,
                    width = width
                ),
                GuideLine::Status(label, value) => println!(
                    "  {} {:<width$}  {}",
                    GEAR,
                    style(label).bold().cyan(),
                    value,
                    width = width
                ),
            }
        }
        println!();
    }
}

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("modotpd")
        .about("Modhex OTP verification service")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8800")
                .env("MODOTPD_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("key-dir")
                .short('k')
                .long("key-dir")
                .help("Directory where key files are stored")
                .default_value("/var/yubi/keys")
                .env("MODOTPD_KEY_DIR"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .help("Increase log verbosity, repeatable")
                .action(ArgAction::Count),
        )
}

use crate::config::ConfigSource;

pub fn print_startup_banner(source: &ConfigSource) {
    const RESET: &str = "\x1b[0m";
    const BANNER_COLOR: &str = "\x1b[38;5;30m";
    const DIM_GRAY: &str = "\x1b[2;90m";
    const BANNER: &str = r#"
   __ _  ___ ___  __ _  __ _| |_ ___
  / _` |/ __/ __|/ _` |/ _` | __/ _ \
 | (_| | (__\__ \ (_| | (_| | ||  __/
  \__,_|\___|___/\__, |\__,_|\__\___|
                 |___/                "#;
    const APP_DESCRIPTION: &str =
        "Tape library control gateway: packet versions 0 through 4 over TCP.";

    println!("{BANNER_COLOR}{BANNER}{RESET}");
    println!(
        "{} v{} | build {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("ACSGATE_BUILD_DATE_UTC")
    );
    println!("{APP_DESCRIPTION}");
    match source {
        ConfigSource::File(path) => println!("{DIM_GRAY}config: {}{RESET}", path.display()),
        ConfigSource::BuiltinDefaults => println!("{DIM_GRAY}config: built-in defaults{RESET}"),
    }
    println!();
}

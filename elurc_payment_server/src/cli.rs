use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "ELURC_HOST",
        "ELURC_PORT",
        "ELURC_DATABASE_URL",
        "ELURC_RPC_URL",
        "ELURC_RPC_TIMEOUT_SECS",
        "ELURC_TOKEN_MINT",
        "ELURC_SHOP_WALLET",
        "ELURC_PAYMENT_TOLERANCE",
        "ELURC_PAYMENT_WINDOW_MINS",
        "ELURC_VALIDATION_MAX_AGE_MINS",
        "ELURC_REFUND_MINIMUM",
        "ELURC_SIGNATURE_PAGE_SIZE",
        "ELURC_EMAIL_WEBHOOK_URL",
        "ELURC_USE_X_FORWARDED_FOR",
        "ELURC_USE_FORWARDED",
        "ELURC_EXPIRY_SWEEP",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
